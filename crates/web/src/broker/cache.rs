//! Timed cache of broker role labels.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

/// Cache key for the broker's role labels.
pub const ROLE_CACHE_KEY: &str = "broker_roles";

/// Default time-to-live of the cached labels.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Read-through cache holding the broker's available role labels under a
/// single fixed key.
///
/// Entries may be stale for up to the TTL. Failed loads are not cached.
#[derive(Clone)]
pub struct RoleCache {
    cache: Cache<&'static str, Arc<Vec<String>>>,
}

impl Default for RoleCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl RoleCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    /// Return the cached labels, or run `load` and cache its result.
    ///
    /// # Errors
    ///
    /// Returns the loader's error; nothing is cached in that case.
    pub async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<Arc<Vec<String>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>, E>>,
    {
        if let Some(labels) = self.cache.get(ROLE_CACHE_KEY).await {
            tracing::debug!("Broker role cache hit");
            return Ok(labels);
        }

        let labels = Arc::new(load().await?);
        self.cache.insert(ROLE_CACHE_KEY, Arc::clone(&labels)).await;
        Ok(labels)
    }

    /// Drop the cached labels so the next read reloads them.
    pub async fn invalidate(&self) {
        self.cache.invalidate(ROLE_CACHE_KEY).await;
    }
}
