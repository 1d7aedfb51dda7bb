//! The registered relying party and client authentication.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use oxide_auth::primitives::registrar::{
    BoundClient, Client, ClientMap, ClientUrl, ExactUrl, PreGrant, RegisteredUrl, Registrar,
    RegistrarError,
};
use oxide_auth::primitives::scope::Scope;
use secrecy::{ExposeSecret, SecretString};

use crate::config::OidcConfig;

use super::OidcError;
use super::claims::{SCOPE_OPENID, Scopes};

/// The single confidential client allowed to use this provider.
///
/// Redirect URIs match exactly. The negotiated scope is the requested scope
/// restricted to what this provider understands, and must include `openid`.
#[derive(Clone)]
pub struct ClientRegistry {
    clients: Arc<ClientMap>,
    post_logout_redirect_uris: Arc<[String]>,
}

impl ClientRegistry {
    /// # Errors
    ///
    /// Returns `OidcError::Configuration` if no redirect URI is configured or
    /// one of them is not an absolute URL.
    pub fn from_config(config: &OidcConfig) -> Result<Self, OidcError> {
        let mut redirect_uris = config
            .redirect_uris
            .iter()
            .map(|uri| {
                uri.parse::<ExactUrl>()
                    .map(RegisteredUrl::Exact)
                    .map_err(|e| OidcError::Configuration(format!("redirect URI {uri}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if redirect_uris.is_empty() {
            return Err(OidcError::Configuration("no redirect URI registered".into()));
        }
        let primary = redirect_uris.remove(0);

        let default_scope: Scope = SCOPE_OPENID
            .parse()
            .map_err(|_| OidcError::Configuration("invalid default scope".into()))?;
        let client = Client::confidential(
            &config.client_id,
            primary,
            default_scope,
            config.client_secret.expose_secret().as_bytes(),
        )
        .with_additional_redirect_uris(redirect_uris);

        let mut clients = ClientMap::new();
        clients.register_client(client);

        Ok(Self {
            clients: Arc::new(clients),
            post_logout_redirect_uris: config.post_logout_redirect_uris.clone().into(),
        })
    }

    #[must_use]
    pub fn allows_post_logout_redirect(&self, uri: &str) -> bool {
        self.post_logout_redirect_uris.iter().any(|u| u == uri)
    }
}

impl Registrar for ClientRegistry {
    fn bound_redirect<'a>(&self, bound: ClientUrl<'a>) -> Result<BoundClient<'a>, RegistrarError> {
        self.clients.bound_redirect(bound)
    }

    fn negotiate(
        &self,
        client: BoundClient<'_>,
        scope: Option<Scope>,
    ) -> Result<PreGrant, RegistrarError> {
        let requested = scope
            .map(|s| Scopes::parse(&s.to_string()).supported())
            .unwrap_or_default();
        if !requested.contains(SCOPE_OPENID) {
            tracing::debug!(scope = %requested, "Authorization request without openid scope");
            return Err(RegistrarError::Unspecified);
        }
        let scope = requested
            .to_string()
            .parse::<Scope>()
            .map_err(|_| RegistrarError::Unspecified)?;

        let mut pre_grant = self.clients.negotiate(client, Some(scope.clone()))?;
        pre_grant.scope = scope;
        Ok(pre_grant)
    }

    fn check(&self, client_id: &str, passphrase: Option<&[u8]>) -> Result<(), RegistrarError> {
        self.clients.check(client_id, passphrase).inspect_err(|_| {
            tracing::warn!(client_id, "Client authentication failed");
        })
    }
}

/// Credentials presented by `client_secret_basic` or `client_secret_post`.
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl ClientCredentials {
    /// Parse an `Authorization: Basic` header value.
    ///
    /// Id and secret are form-urlencoded before base64 encoding.
    #[must_use]
    pub fn from_basic(header: &str) -> Option<Self> {
        let encoded = header
            .strip_prefix("Basic ")
            .or_else(|| header.strip_prefix("basic "))?;
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (id, secret) = decoded.split_once(':')?;

        Some(Self {
            client_id: form_decode(id)?,
            client_secret: SecretString::from(form_decode(secret)?),
        })
    }

    /// Credentials sent as form fields.
    #[must_use]
    pub fn from_form(client_id: Option<&str>, client_secret: Option<&str>) -> Option<Self> {
        Some(Self {
            client_id: client_id?.to_owned(),
            client_secret: SecretString::from(client_secret?.to_owned()),
        })
    }

    /// The raw `id:secret` Basic header the token engine authenticates with.
    #[must_use]
    pub fn to_basic(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret.expose_secret());
        format!("Basic {}", STANDARD.encode(raw))
    }
}

fn form_decode(value: &str) -> Option<String> {
    urlencoding::decode(&value.replace('+', " "))
        .ok()
        .map(std::borrow::Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    fn registry() -> ClientRegistry {
        ClientRegistry::from_config(&test_config().oidc).unwrap()
    }

    #[test]
    fn test_client_secret_is_checked() {
        let registry = registry();
        assert!(
            registry
                .check("keycloak-client", Some(b"rp-client-credential-0123456789"))
                .is_ok()
        );
        assert!(registry.check("keycloak-client", Some(b"nope")).is_err());
        assert!(registry.check("keycloak-client", None).is_err());
        assert!(registry.check("other", Some(b"rp-client-credential-0123456789")).is_err());
    }

    #[test]
    fn test_post_logout_redirects_match_exactly() {
        let registry = registry();
        assert!(registry.allows_post_logout_redirect("http://localhost:8080/"));
        assert!(!registry.allows_post_logout_redirect("http://localhost:8080"));
        assert!(!registry.allows_post_logout_redirect("http://evil.test/"));
    }

    #[test]
    fn test_relative_redirect_uri_is_a_configuration_error() {
        let mut config = test_config().oidc;
        config.redirect_uris = vec!["/callback".to_string()];
        assert!(matches!(
            ClientRegistry::from_config(&config),
            Err(OidcError::Configuration(_))
        ));

        config.redirect_uris.clear();
        assert!(ClientRegistry::from_config(&config).is_err());
    }

    #[test]
    fn test_basic_credentials_are_form_decoded() {
        let header = format!("Basic {}", STANDARD.encode("my%20client:a%3Ab"));
        let credentials = ClientCredentials::from_basic(&header).unwrap();

        assert_eq!(credentials.client_id, "my client");
        assert_eq!(credentials.client_secret.expose_secret(), "a:b");
        assert_eq!(
            credentials.to_basic(),
            format!("Basic {}", STANDARD.encode("my client:a:b"))
        );
    }

    #[test]
    fn test_malformed_credentials() {
        assert!(ClientCredentials::from_basic("Bearer abc").is_none());
        assert!(ClientCredentials::from_form(None, Some("x")).is_none());
        assert!(ClientCredentials::from_form(Some("keycloak-client"), None).is_none());
    }
}
