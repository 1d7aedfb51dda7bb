//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::broker::{BrokerError, BrokerSync, KeycloakAdminClient, RoleCache};
use crate::config::AppConfig;
use crate::db::PgAccountStore;
use crate::oidc::{OidcError, OidcProvider};

/// Failure to assemble the application state at start-up.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("identity broker client: {0}")]
    Broker(#[from] BrokerError),

    #[error("OIDC provider: {0}")]
    Oidc(#[from] OidcError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    accounts: PgAccountStore,
    broker: BrokerSync,
    oidc: OidcProvider,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker HTTP client cannot be built or the
    /// OIDC provider configuration is unusable.
    pub fn new(config: AppConfig, pool: PgPool) -> Result<Self, StateError> {
        let client = KeycloakAdminClient::new(&config.keycloak)?;
        let broker = BrokerSync::new(client, RoleCache::default());
        let oidc = OidcProvider::new(&config)?;
        let accounts = PgAccountStore::new(pool.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                accounts,
                broker,
                oidc,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn accounts(&self) -> &PgAccountStore {
        &self.inner.accounts
    }

    /// Best-effort identity broker synchronization.
    #[must_use]
    pub fn broker(&self) -> &BrokerSync {
        &self.inner.broker
    }

    #[must_use]
    pub fn oidc(&self) -> &OidcProvider {
        &self.inner.oidc
    }
}
