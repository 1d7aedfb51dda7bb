//! Database operations for the Foodi `PostgreSQL` database.
//!
//! ## Tables (schema `foodi`)
//!
//! - `account` - Local identities, permission tier and broker binding
//! - `menu_item` - Dishes shown on the menu
//! - `purchase_order` - Purchase records with serialized line items
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/web/migrations/` and run via:
//! ```bash
//! cargo run -p foodi-cli -- migrate
//! ```

pub mod accounts;
pub mod menu;
pub mod orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use foodi_core::{AccountId, Email, PermissionTier};

use crate::models::{Account, AccountStats, NewAccount, ProfileUpdate};

pub use accounts::PgAccountStore;
pub use menu::MenuRepository;
pub use orders::{OrderRepository, OrderSummary};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique handle or email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a sqlx error, turning unique violations into `Conflict`.
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Persistence for accounts.
///
/// Implemented by [`PgAccountStore`] in production; services are generic over
/// it so they can run against an in-memory store in tests.
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Fails with `Conflict` on a duplicate handle or email.
    fn create(
        &self,
        input: NewAccount,
    ) -> impl Future<Output = Result<Account, RepositoryError>> + Send;

    fn find_by_id(
        &self,
        id: AccountId,
    ) -> impl Future<Output = Result<Option<Account>, RepositoryError>> + Send;

    /// Look up by handle or contact address (case-insensitive).
    fn find_by_login(
        &self,
        identifier: &str,
    ) -> impl Future<Output = Result<Option<Account>, RepositoryError>> + Send;

    fn find_by_email(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<Account>, RepositoryError>> + Send;

    /// Whether any account already uses this handle or this email.
    fn exists_with_handle_or_email(
        &self,
        handle: &str,
        email: &Email,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Whether an account other than `except` uses this email.
    fn email_taken_by_other(
        &self,
        email: &Email,
        except: AccountId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    fn update_profile(
        &self,
        id: AccountId,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<Account, RepositoryError>> + Send;

    fn update_password_hash(
        &self,
        id: AccountId,
        password_hash: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Flip the active flag. Deactivation stamps `deactivated_at`, activation
    /// clears it, in the same write.
    fn set_active(
        &self,
        id: AccountId,
        active: bool,
    ) -> impl Future<Output = Result<Account, RepositoryError>> + Send;

    fn set_tier(
        &self,
        id: AccountId,
        tier: PermissionTier,
    ) -> impl Future<Output = Result<Account, RepositoryError>> + Send;

    fn set_remote_roles(
        &self,
        id: AccountId,
        labels: &[String],
    ) -> impl Future<Output = Result<Account, RepositoryError>> + Send;

    /// Record the broker id and set the synchronized flag.
    fn mark_synced(
        &self,
        id: AccountId,
        remote_id: &str,
    ) -> impl Future<Output = Result<Account, RepositoryError>> + Send;

    /// All accounts, newest first.
    fn list_all(&self) -> impl Future<Output = Result<Vec<Account>, RepositoryError>> + Send;

    fn stats(&self) -> impl Future<Output = Result<AccountStats, RepositoryError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
