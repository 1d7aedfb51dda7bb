//! Identity-broker (Keycloak) synchronization.
//!
//! Keeps the broker's user object eventually consistent with the local
//! account record. The local database is always written first; broker calls
//! are best-effort and their failures only ever surface as a `false`/`None`
//! result plus a log line.
//!
//! # Layers
//!
//! - [`KeycloakAdminClient`] - thin `reqwest` transport over the admin REST API,
//!   with an in-memory admin token reused until shortly before expiry
//! - [`plan_role_changes`] - pure diff of current vs desired role labels
//! - [`RoleCache`] - timed cache of the broker's available role labels
//! - [`BrokerSync`] - orchestration implementing [`IdentityBroker`]

pub mod cache;
pub mod client;
pub mod roles;
pub mod sync;
pub mod token;

use std::future::Future;

use thiserror::Error;

use foodi_core::PermissionTier;

use crate::models::Account;

pub use cache::RoleCache;
pub use client::KeycloakAdminClient;
pub use roles::{RolePlan, plan_role_changes};
pub use sync::BrokerSync;

/// Errors from the broker admin API.
///
/// These never leave the broker module: [`BrokerSync`] logs them and reports
/// a failed sync instead.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Network or decoding failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The admin API answered with a non-success status.
    #[error("{operation} failed with HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The admin token was rejected.
    #[error("{0} rejected the admin token")]
    Unauthorized(&'static str),

    /// User creation succeeded but no `Location` header identified the user.
    #[error("created user has no Location header")]
    MissingLocation,

    /// The role client is not registered on the broker.
    #[error("client not found: {0}")]
    ClientNotFound(String),

    /// A role expected to exist could not be found.
    #[error("role not found: {0}")]
    RoleNotFound(String),
}

/// Best-effort operations against the identity broker.
///
/// Implementations must not fail: transport errors are logged and turned
/// into `None`, `false` or an empty list.
pub trait IdentityBroker: Send + Sync {
    /// Create the remote user with a non-temporary password.
    ///
    /// Returns the broker-assigned id.
    fn create_user(
        &self,
        account: &Account,
        password: &str,
    ) -> impl Future<Output = Option<String>> + Send;

    /// Push handle, email, names and the enabled flag.
    fn update_profile(&self, account: &Account) -> impl Future<Output = bool> + Send;

    fn set_enabled(&self, remote_id: &str, enabled: bool) -> impl Future<Output = bool> + Send;

    fn reset_password(&self, remote_id: &str, password: &str)
    -> impl Future<Output = bool> + Send;

    /// Make the user's realm tier role match `tier`, removing other tier roles.
    fn sync_tier(&self, remote_id: &str, tier: PermissionTier)
    -> impl Future<Output = bool> + Send;

    /// Replace the user's client role labels with `labels`.
    ///
    /// Labels missing on the broker are created first.
    fn replace_roles(&self, remote_id: &str, labels: &[String])
    -> impl Future<Output = bool> + Send;

    /// Role labels defined on the broker, served from a short-lived cache.
    fn available_roles(&self) -> impl Future<Output = Vec<String>> + Send;

    fn invalidate_role_cache(&self) -> impl Future<Output = ()> + Send;
}
