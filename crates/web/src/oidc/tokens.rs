//! HS256 access and refresh tokens.
//!
//! [`TokenIssuer`] is the token engine's [`Issuer`]: tokens are self-contained
//! JWTs, so recovering a grant is a signature check rather than a lookup.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use oxide_auth::primitives::grant::{Extensions, Grant};
use oxide_auth::primitives::issuer::{IssuedToken, Issuer, RefreshedToken, TokenType};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;

use crate::models::Account;

use super::OidcError;
use super::claims::{Destination, SCOPE_OFFLINE_ACCESS, Scopes, claims_for};

/// Distinguishes access from refresh tokens signed with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Claims of access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    /// Account id.
    pub sub: String,
    /// Client id.
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub scope: String,
    pub token_use: TokenUse,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    #[must_use]
    pub fn scopes(&self) -> Scopes {
        Scopes::parse(&self.scope)
    }
}

/// Signs and verifies tokens for one issuer and audience.
#[derive(Clone)]
pub struct TokenIssuer {
    issuer: Url,
    audience: String,
    key: SecretString,
    access_ttl: Duration,
    refresh_ttl: Duration,
    /// Account whose claims go into the next access token.
    subject: Option<Arc<Account>>,
}

impl TokenIssuer {
    #[must_use]
    pub const fn new(
        issuer: Url,
        audience: String,
        key: SecretString,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            issuer,
            audience,
            key,
            access_ttl,
            refresh_ttl,
            subject: None,
        }
    }

    /// A copy that puts `account`'s access-token claims into issued tokens.
    #[must_use]
    pub fn for_account(&self, account: Option<&Account>) -> Self {
        Self {
            subject: account.map(|a| Arc::new(a.clone())),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        self.issuer.as_str().trim_end_matches('/')
    }

    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Verify signature, issuer, audience, expiry and token use.
    ///
    /// # Errors
    ///
    /// Returns `OidcError::InvalidToken` describing the first failed check.
    pub fn verify(&self, token: &str, expected: TokenUse) -> Result<TokenClaims, OidcError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer()]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "sub", "aud"]);

        let key = DecodingKey::from_secret(self.key.expose_secret().as_bytes());
        let claims = jsonwebtoken::decode::<TokenClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => OidcError::InvalidToken("token has expired".into()),
                _ => OidcError::InvalidToken(format!("invalid token: {e}")),
            })?;

        if claims.token_use != expected {
            return Err(OidcError::InvalidToken("wrong token type".into()));
        }
        Ok(claims)
    }

    fn sign(
        &self,
        grant: &Grant,
        scope: &Scopes,
        token_use: TokenUse,
    ) -> Result<(String, DateTime<Utc>), OidcError> {
        let (ttl, extra) = match token_use {
            TokenUse::Access => (
                self.access_ttl,
                self.subject
                    .as_deref()
                    .filter(|account| account.id.to_string() == grant.owner_id)
                    .map(|account| claims_for(account, Destination::AccessToken))
                    .unwrap_or_default(),
            ),
            TokenUse::Refresh => (self.refresh_ttl, Map::new()),
        };

        let now = Utc::now();
        let until = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(now);
        let claims = TokenClaims {
            iss: self.issuer().to_owned(),
            sub: grant.owner_id.clone(),
            aud: grant.client_id.clone(),
            exp: until.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            scope: scope.to_string(),
            token_use,
            extra,
        };

        let key = EncodingKey::from_secret(self.key.expose_secret().as_bytes());
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
            .map_err(|e| OidcError::Signing(e.to_string()))?;
        Ok((token, until))
    }

    fn recover(&self, token: &str, expected: TokenUse) -> Option<Grant> {
        let claims = self.verify(token, expected).ok()?;
        Some(Grant {
            owner_id: claims.sub,
            client_id: claims.aud,
            scope: claims.scope.parse().ok()?,
            redirect_uri: self.issuer.clone(),
            until: DateTime::from_timestamp(claims.exp, 0)?,
            extensions: Extensions::new(),
        })
    }
}

fn grant_scopes(grant: &Grant) -> Scopes {
    Scopes::parse(&grant.scope.to_string())
}

fn logged(result: Result<(String, DateTime<Utc>), OidcError>) -> Result<(String, DateTime<Utc>), ()> {
    result.map_err(|err| {
        tracing::error!(error = %err, "Failed to sign token");
    })
}

impl Issuer for TokenIssuer {
    /// Access token, plus a refresh token when `offline_access` was granted.
    fn issue(&mut self, grant: Grant) -> Result<IssuedToken, ()> {
        let scope = grant_scopes(&grant);
        let (token, until) = logged(self.sign(&grant, &scope, TokenUse::Access))?;
        let refresh = if scope.contains(SCOPE_OFFLINE_ACCESS) {
            Some(logged(self.sign(&grant, &scope, TokenUse::Refresh))?.0)
        } else {
            None
        };

        Ok(IssuedToken {
            token,
            refresh,
            until,
            token_type: TokenType::Bearer,
        })
    }

    /// `grant` carries the scope requested for this refresh, which may be
    /// narrower than the original grant. The rotated refresh token keeps the
    /// original scope so a later refresh can ask for it again.
    fn refresh(&mut self, refresh: &str, grant: Grant) -> Result<RefreshedToken, ()> {
        let original = self.verify(refresh, TokenUse::Refresh).map_err(|_| ())?;

        let (token, until) = logged(self.sign(&grant, &grant_scopes(&grant), TokenUse::Access))?;
        let (refresh, _) = logged(self.sign(&grant, &original.scopes(), TokenUse::Refresh))?;

        Ok(RefreshedToken {
            token,
            refresh: Some(refresh),
            until,
            token_type: TokenType::Bearer,
        })
    }

    fn recover_token<'a>(&'a self, token: &'a str) -> Result<Option<Grant>, ()> {
        Ok(self.recover(token, TokenUse::Access))
    }

    fn recover_refresh<'a>(&'a self, token: &'a str) -> Result<Option<Grant>, ()> {
        Ok(self.recover(token, TokenUse::Refresh))
    }
}
