//! Account bootstrap command.
//!
//! Creates an account straight in the database, typically the first Head
//! account. The account is not linked to the identity broker; it can still
//! sign in locally and through the federated flow.
//!
//! # Environment Variables
//!
//! - `FOODI_DATABASE_URL` - `PostgreSQL` connection string
//! - `FOODI_BOOTSTRAP_PASSWORD` - Password of the new account

use thiserror::Error;

use foodi_core::{AccountId, Email, Handle, PermissionTier};
use foodi_web::db::{AccountStore, PgAccountStore, RepositoryError};
use foodi_web::models::NewAccount;
use foodi_web::services::auth::{AuthError, hash_password, validate_password};

use super::{CommandError, connect};

/// Errors that can occur while creating an account.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// Invalid tier name.
    #[error("Invalid tier: {0}. Valid tiers: agent, lead, admin, head")]
    InvalidTier(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] foodi_core::EmailError),

    #[error("Invalid handle: {0}")]
    InvalidHandle(#[from] foodi_core::HandleError),

    #[error("{0}")]
    Password(#[from] AuthError),

    /// Handle or email already registered.
    #[error("An account already exists with handle {0} or this email")]
    AccountExists(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Create an account with the password from `FOODI_BOOTSTRAP_PASSWORD`.
///
/// # Returns
///
/// The ID of the created account.
///
/// # Errors
///
/// Returns an error for invalid input, a taken handle or email, or a
/// database failure.
pub async fn create(
    handle: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
    tier: &str,
) -> Result<AccountId, AccountError> {
    let tier: PermissionTier = tier
        .parse()
        .map_err(|_| AccountError::InvalidTier(tier.to_owned()))?;
    let handle = Handle::parse(handle)?;
    let email = Email::parse(email)?;

    dotenvy::dotenv().ok();
    let password = std::env::var("FOODI_BOOTSTRAP_PASSWORD")
        .map_err(|_| CommandError::MissingEnvVar("FOODI_BOOTSTRAP_PASSWORD"))?;
    validate_password(&password)?;

    let store = PgAccountStore::new(connect().await?);
    if store
        .exists_with_handle_or_email(handle.as_str(), &email)
        .await?
    {
        return Err(AccountError::AccountExists(handle.to_string()));
    }

    tracing::info!("Creating account: {} ({})", handle, tier);
    let account = store
        .create(NewAccount {
            handle,
            email,
            password_hash: hash_password(&password)?,
            first_name: first_name.trim().to_owned(),
            last_name: last_name.trim().to_owned(),
            tier,
        })
        .await?;

    tracing::info!(
        "Account created successfully! ID: {}, Handle: {}, Tier: {}",
        account.id,
        account.handle,
        account.tier.info().display_name
    );
    Ok(account.id)
}
