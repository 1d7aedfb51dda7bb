//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use tower_sessions::cookie::{Key, KeyError, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AppConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "foodi_session";

/// Lifetime of a login, in seconds (24 hours).
pub const LOGIN_LIFETIME_SECONDS: i64 = 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// The `tower_sessions.session` table is created by the CLI migrations.
///
/// # Errors
///
/// Returns an error if the session secret is too short to sign cookies.
pub fn create_session_layer(
    pool: &PgPool,
    config: &AppConfig,
) -> Result<SessionManagerLayer<PostgresStore, SignedCookie>, KeyError> {
    session_layer(PostgresStore::new(pool.clone()), config)
}

/// Apply the cookie settings to any store.
///
/// Cookies are browser-session cookies by default; a remember-me login
/// switches its own session to a fixed 24 hour expiry.
///
/// # Errors
///
/// Returns an error if the session secret is shorter than 64 bytes.
pub fn session_layer<S: SessionStore + Clone>(
    store: S,
    config: &AppConfig,
) -> Result<SessionManagerLayer<S, SignedCookie>, KeyError> {
    let key = Key::try_from(config.session_secret.expose_secret().as_bytes())?;

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnSessionEnd)
        .with_secure(config.is_https())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key))
}
