//! Application configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FOODI_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `FOODI_BASE_URL` - Public URL of this site; also the OIDC issuer
//! - `FOODI_SESSION_SECRET` - Session cookie signing key (min 64 chars, high entropy)
//! - `KEYCLOAK_BASE_URL` - Identity broker base URL (e.g. `http://localhost:8080`)
//! - `KEYCLOAK_ADMIN_USERNAME` - Broker admin account
//! - `KEYCLOAK_ADMIN_PASSWORD` - Broker admin password
//! - `OIDC_CLIENT_SECRET` - Secret of the broker's client registration with us
//! - `OIDC_REDIRECT_URIS` - Comma-separated redirect URIs registered for that client
//! - `OIDC_TOKEN_SECRET` - Access/refresh token signing key (min 32 chars, high entropy)
//!
//! ## Optional
//! - `FOODI_HOST` - Bind address (default: 127.0.0.1)
//! - `FOODI_PORT` - Listen port (default: 5000)
//! - `KEYCLOAK_REALM` - Broker realm (default: master)
//! - `KEYCLOAK_ADMIN_CLIENT_ID` - Client used for the admin password grant (default: admin-cli)
//! - `KEYCLOAK_ROLE_CLIENT` - Client whose roles are the managed labels (default: foodi)
//! - `KEYCLOAK_IDP_ALIAS` - Alias of this site as an identity provider in the broker (default: foodi)
//! - `KEYCLOAK_TIMEOUT_SECS` - Admin API request timeout (default: 10)
//! - `OIDC_CLIENT_ID` - Client id the broker uses with us (default: keycloak-client)
//! - `OIDC_POST_LOGOUT_REDIRECT_URIS` - Comma-separated post-logout redirect URIs
//! - `OIDC_ACCESS_TOKEN_TTL_SECS` - Access/ID token lifetime (default: 3600)
//! - `OIDC_REFRESH_TOKEN_TTL_SECS` - Refresh token lifetime (default: 1209600)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// The signed session cookie key must be at least 64 bytes.
const MIN_SESSION_SECRET_LENGTH: usize = 64;
const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    /// Session cookie signing key
    pub session_secret: SecretString,
    /// Identity broker admin API settings
    pub keycloak: KeycloakConfig,
    /// Settings for our own OIDC provider surface
    pub oidc: OidcConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Identity broker (Keycloak) admin API configuration.
///
/// Implements `Debug` manually to redact the admin password.
#[derive(Clone)]
pub struct KeycloakConfig {
    /// Broker base URL, without trailing slash
    pub base_url: String,
    /// Realm holding the synchronized users
    pub realm: String,
    /// Client id used for the admin password grant
    pub admin_client_id: String,
    /// Admin username
    pub admin_username: String,
    /// Admin password
    pub admin_password: SecretString,
    /// Client (by `clientId`) whose client roles are the managed role labels
    pub role_client: String,
    /// Alias under which the broker knows this site as an identity provider
    pub idp_alias: String,
    /// Timeout applied to every admin API request
    pub timeout: Duration,
}

impl std::fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("base_url", &self.base_url)
            .field("realm", &self.realm)
            .field("admin_client_id", &self.admin_client_id)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"[REDACTED]")
            .field("role_client", &self.role_client)
            .field("idp_alias", &self.idp_alias)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// OIDC provider configuration: the single registered relying party and
/// token signing settings.
///
/// Implements `Debug` manually to redact secrets.
#[derive(Clone)]
pub struct OidcConfig {
    /// Client id of the relying party (the broker)
    pub client_id: String,
    /// Client secret; also the HS256 key for ID tokens
    pub client_secret: SecretString,
    /// Registered redirect URIs (exact match)
    pub redirect_uris: Vec<String>,
    /// Registered post-logout redirect URIs (exact match)
    pub post_logout_redirect_uris: Vec<String>,
    /// HS256 key for access and refresh tokens
    pub token_secret: SecretString,
    /// Access and ID token lifetime
    pub access_token_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uris", &self.redirect_uris)
            .field("post_logout_redirect_uris", &self.post_logout_redirect_uris)
            .field("token_secret", &"[REDACTED]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("FOODI_DATABASE_URL")?;
        let host = parse_env("FOODI_HOST", "127.0.0.1")?;
        let port = parse_env("FOODI_PORT", "5000")?;
        let base_url = trim_url(get_required_env("FOODI_BASE_URL")?);
        let session_secret = get_validated_secret("FOODI_SESSION_SECRET")?;
        validate_secret_length(
            &session_secret,
            "FOODI_SESSION_SECRET",
            MIN_SESSION_SECRET_LENGTH,
        )?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            keycloak: KeycloakConfig::from_env()?,
            oidc: OidcConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl KeycloakConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs: u64 = parse_env("KEYCLOAK_TIMEOUT_SECS", "10")?;
        Ok(Self {
            base_url: trim_url(get_required_env("KEYCLOAK_BASE_URL")?),
            realm: get_env_or_default("KEYCLOAK_REALM", "master"),
            admin_client_id: get_env_or_default("KEYCLOAK_ADMIN_CLIENT_ID", "admin-cli"),
            admin_username: get_required_env("KEYCLOAK_ADMIN_USERNAME")?,
            admin_password: get_required_secret("KEYCLOAK_ADMIN_PASSWORD")?,
            role_client: get_env_or_default("KEYCLOAK_ROLE_CLIENT", "foodi"),
            idp_alias: get_env_or_default("KEYCLOAK_IDP_ALIAS", "foodi"),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl OidcConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let redirect_uris = split_list(&get_required_env("OIDC_REDIRECT_URIS")?);
        if redirect_uris.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "OIDC_REDIRECT_URIS".to_string(),
                "at least one redirect URI is required".to_string(),
            ));
        }
        let token_secret = get_validated_secret("OIDC_TOKEN_SECRET")?;
        validate_secret_length(&token_secret, "OIDC_TOKEN_SECRET", MIN_TOKEN_SECRET_LENGTH)?;

        let access_secs: u64 = parse_env("OIDC_ACCESS_TOKEN_TTL_SECS", "3600")?;
        let refresh_secs: u64 = parse_env("OIDC_REFRESH_TOKEN_TTL_SECS", "1209600")?;

        Ok(Self {
            client_id: get_env_or_default("OIDC_CLIENT_ID", "keycloak-client"),
            client_secret: get_required_secret("OIDC_CLIENT_SECRET")?,
            redirect_uris,
            post_logout_redirect_uris: get_optional_env("OIDC_POST_LOGOUT_REDIRECT_URIS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            token_secret,
            access_token_ttl: Duration::from_secs(access_secs),
            refresh_token_ttl: Duration::from_secs(refresh_secs),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated list, dropping blanks.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_owned()
}

/// Validate that a secret meets a minimum length.
fn validate_secret_length(
    secret: &SecretString,
    var_name: &str,
    min: usize,
) -> Result<(), ConfigError> {
    let len = secret.expose_secret().len();
    if len < min {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("must be at least {min} characters (got {len})"),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
