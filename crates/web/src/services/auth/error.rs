//! Authentication and account error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during account and authentication operations.
///
/// The `Display` text of the user-facing variants is shown to the user as is.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] foodi_core::EmailError),

    /// Invalid handle format.
    #[error("invalid username: {0}")]
    InvalidHandle(#[from] foodi_core::HandleError),

    /// Unknown account or wrong password. Deliberately indistinguishable.
    #[error("Invalid login attempt.")]
    InvalidCredentials,

    /// Correct password, but the account is deactivated.
    #[error("Your account has been deactivated. Please contact support to reactivate.")]
    AccountInactive,

    /// Reactivation of an account that is not deactivated.
    #[error("Account is already active.")]
    AlreadyActive,

    /// Handle or email already registered.
    #[error("User with this email or username already exists.")]
    AlreadyExists,

    /// Email used by another account.
    #[error("This email is already used by another account.")]
    EmailInUse,

    /// Current password did not verify during a password change.
    #[error("Current password is incorrect.")]
    IncorrectPassword,

    /// Password too short or too long.
    #[error("{0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("Passwords do not match.")]
    PasswordMismatch,

    /// Account not found.
    #[error("account not found")]
    NotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Map a repository write error, turning uniqueness conflicts into
    /// `AlreadyExists`.
    pub(crate) fn from_write(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(_) => Self::AlreadyExists,
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}
