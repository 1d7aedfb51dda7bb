//! Authorization codes.
//!
//! The token engine owns code issuance, redirect matching and PKCE through
//! [`CodeStore`]. [`CodeBindings`] remembers what the engine's grant does not
//! carry: the signed-in account and the request nonce.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use moka::future::Cache;
use oxide_auth::primitives::authorizer::{AuthMap, Authorizer};
use oxide_auth::primitives::generator::RandomGenerator;
use oxide_auth::primitives::grant::Grant;

use foodi_core::AccountId;

/// Lifetime of an unredeemed authorization code.
pub const CODE_TTL: Duration = Duration::from_secs(300);

/// Single-use authorization codes that expire after a fixed lifetime.
#[derive(Clone)]
pub struct CodeStore {
    codes: Arc<Mutex<AuthMap<RandomGenerator>>>,
    ttl: TimeDelta,
}

impl Default for CodeStore {
    fn default() -> Self {
        Self::new(CODE_TTL)
    }
}

impl CodeStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            codes: Arc::new(Mutex::new(AuthMap::new(RandomGenerator::new(32)))),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::minutes(5)),
        }
    }
}

impl Authorizer for CodeStore {
    fn authorize(&mut self, mut grant: Grant) -> Result<String, ()> {
        grant.until = Utc::now() + self.ttl;
        self.codes.lock().map_err(|_| ())?.authorize(grant)
    }

    /// Removes the code; an expired code is removed and reported as unknown.
    fn extract(&mut self, code: &str) -> Result<Option<Grant>, ()> {
        let grant = self.codes.lock().map_err(|_| ())?.extract(code)?;
        Ok(grant.filter(|grant| grant.until > Utc::now()))
    }
}

/// Who approved a code, and the nonce to echo in the ID token.
#[derive(Debug, Clone)]
pub struct CodeBinding {
    pub account_id: AccountId,
    pub nonce: Option<String>,
}

/// Side table keyed by authorization code, living as long as the code.
#[derive(Clone)]
pub struct CodeBindings {
    bindings: Cache<String, Arc<CodeBinding>>,
}

impl Default for CodeBindings {
    fn default() -> Self {
        Self::new(CODE_TTL)
    }
}

impl CodeBindings {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            bindings: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn bind(&self, code: String, binding: CodeBinding) {
        self.bindings.insert(code, Arc::new(binding)).await;
    }

    /// Live binding for `code`, if any.
    pub async fn get(&self, code: &str) -> Option<Arc<CodeBinding>> {
        self.bindings.get(code).await
    }

    pub async fn release(&self, code: &str) {
        self.bindings.invalidate(code).await;
    }
}
