//! Password authentication.
//!
//! Passwords are hashed with Argon2id and a random salt (PHC string format).

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::db::AccountStore;
use crate::models::Account;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length, in characters.
pub const MAX_PASSWORD_LENGTH: usize = 100;

/// Credential verification against the account store.
pub struct AuthService<'a, S> {
    accounts: &'a S,
}

impl<'a, S: AccountStore> AuthService<'a, S> {
    #[must_use]
    pub const fn new(accounts: &'a S) -> Self {
        Self { accounts }
    }

    /// Verify a handle-or-email and password.
    ///
    /// The inactive check only runs after the password verifies, so a wrong
    /// password on a deactivated account still reads as a bad login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown account or wrong
    /// password, and `AuthError::AccountInactive` for a deactivated account.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<Account, AuthError> {
        let account = self
            .accounts
            .find_by_login(login)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &account.password_hash)?;

        if !account.is_active {
            return Err(AuthError::AccountInactive);
        }

        Ok(account)
    }
}

/// Validate password length.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` outside 6..=100 characters.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        return Err(AuthError::WeakPassword(format!(
            "Password must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH} characters long."
        )));
    }
    Ok(())
}

/// Validate a new password together with its confirmation.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` or `AuthError::PasswordMismatch`.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), AuthError> {
    validate_password(password)?;
    if password != confirmation {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the password does not match or
/// the stored hash is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
