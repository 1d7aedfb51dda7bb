//! Admin bearer token for the broker admin API.
//!
//! Tokens are obtained with a password grant against the admin realm and kept
//! in memory until shortly before they expire.

use std::time::{Duration, Instant};

use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::RwLock;

/// How long before reported expiry a token stops being reused.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// A bearer token and the instant it expires.
#[derive(Debug, Clone)]
pub struct AdminToken {
    pub access_token: SecretString,
    pub expires_at: Instant,
}

impl AdminToken {
    /// Build a token from an `expires_in` lifetime measured from `now`.
    ///
    /// A lifetime too large to represent yields a token that is already
    /// stale.
    #[must_use]
    pub fn new(access_token: SecretString, expires_in: Duration, now: Instant) -> Self {
        Self {
            access_token,
            expires_at: now.checked_add(expires_in).unwrap_or(now),
        }
    }

    /// Whether the token can still be used at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.checked_add(EXPIRY_MARGIN)
            .is_some_and(|cutoff| cutoff < self.expires_at)
    }
}

/// Token endpoint response.
#[derive(Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

const fn default_expires_in() -> u64 {
    60
}

/// In-memory cache holding at most one admin token.
#[derive(Debug, Default)]
pub struct TokenCache {
    token: RwLock<Option<AdminToken>>,
}

impl TokenCache {
    /// The cached token if it is still fresh.
    pub async fn fresh(&self) -> Option<SecretString> {
        let now = Instant::now();
        self.token
            .read()
            .await
            .as_ref()
            .filter(|token| token.is_fresh(now))
            .map(|token| token.access_token.clone())
    }

    pub async fn store(&self, token: AdminToken) {
        *self.token.write().await = Some(token);
    }

    /// Drop the cached token so the next call re-authenticates.
    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn token(expires_in: Duration, now: Instant) -> AdminToken {
        AdminToken::new(SecretString::from("abc"), expires_in, now)
    }

    #[test]
    fn test_fresh_until_margin() {
        let now = Instant::now();
        let t = token(Duration::from_secs(60), now);
        assert!(t.is_fresh(now));
        assert!(t.is_fresh(now + Duration::from_secs(29)));
        assert!(!t.is_fresh(now + Duration::from_secs(30)));
        assert!(!t.is_fresh(now + Duration::from_secs(90)));
    }

    #[test]
    fn test_short_lived_token_never_fresh() {
        let now = Instant::now();
        assert!(!token(Duration::from_secs(10), now).is_fresh(now));
    }

    #[test]
    fn test_unrepresentable_lifetime_is_stale() {
        let now = Instant::now();
        let t = token(Duration::MAX, now);
        assert_eq!(t.expires_at, now);
        assert!(!t.is_fresh(now));
    }

    #[tokio::test]
    async fn test_cache_store_and_clear() {
        let cache = TokenCache::default();
        assert!(cache.fresh().await.is_none());

        cache
            .store(token(Duration::from_secs(300), Instant::now()))
            .await;
        let cached = cache.fresh().await.map(|s| s.expose_secret().to_owned());
        assert_eq!(cached.as_deref(), Some("abc"));

        cache.clear().await;
        assert!(cache.fresh().await.is_none());
    }

    #[tokio::test]
    async fn test_cache_skips_expiring_token() {
        let cache = TokenCache::default();
        cache
            .store(token(Duration::from_secs(5), Instant::now()))
            .await;
        assert!(cache.fresh().await.is_none());
    }
}
