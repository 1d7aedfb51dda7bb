//! Self-service account operations.
//!
//! Every operation commits the local change first and only then attempts the
//! matching broker call. A broker failure never rolls back the local write; it
//! is reported as [`SyncOutcome::Failed`] so the caller can show a warning.

use serde::Deserialize;
use tracing::{info, instrument};

use foodi_core::{AccountId, Email, Handle, PermissionTier};

use super::auth::{
    AuthError, AuthService, hash_password, validate_new_password, verify_password,
};
use crate::broker::IdentityBroker;
use crate::db::AccountStore;
use crate::models::{Account, CurrentAccount, NewAccount, ProfileUpdate};

/// Result of the broker half of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The broker accepted the change.
    Synced,
    /// The account has no broker user, so nothing was sent.
    NotLinked,
    /// The broker call failed; the local change stands.
    Failed,
}

impl SyncOutcome {
    #[must_use]
    pub const fn from_success(ok: bool) -> Self {
        if ok { Self::Synced } else { Self::Failed }
    }

    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Registration form.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub handle: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
    pub confirm_password: String,
}

/// Profile edit form.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileForm {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Password change form.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Account operations for the signed-in user.
pub struct AccountService<'a, S, B> {
    accounts: &'a S,
    broker: &'a B,
}

impl<'a, S: AccountStore, B: IdentityBroker> AccountService<'a, S, B> {
    #[must_use]
    pub const fn new(accounts: &'a S, broker: &'a B) -> Self {
        Self { accounts, broker }
    }

    /// Register a new `Agent` account and create its broker user.
    ///
    /// Uniqueness of handle and email is checked before anything is written.
    ///
    /// # Errors
    ///
    /// Returns a validation error, `AuthError::AlreadyExists`, or a
    /// repository error. Broker failures are not errors.
    #[instrument(skip(self, form), fields(handle = %form.handle))]
    pub async fn register(&self, form: &Registration) -> Result<(Account, SyncOutcome), AuthError> {
        let handle = Handle::parse(&form.handle)?;
        let email = Email::parse(&form.email)?;
        validate_new_password(&form.password, &form.confirm_password)?;

        if self
            .accounts
            .exists_with_handle_or_email(handle.as_str(), &email)
            .await?
        {
            return Err(AuthError::AlreadyExists);
        }

        let account = self
            .accounts
            .create(NewAccount {
                handle,
                email,
                password_hash: hash_password(&form.password)?,
                first_name: form.first_name.trim().to_owned(),
                last_name: form.last_name.trim().to_owned(),
                tier: PermissionTier::Agent,
            })
            .await
            .map_err(AuthError::from_write)?;
        info!(account_id = %account.id, "Account registered");

        let Some(remote_id) = self.broker.create_user(&account, &form.password).await else {
            return Ok((account, SyncOutcome::Failed));
        };

        let account = self.accounts.mark_synced(account.id, &remote_id).await?;
        let outcome = SyncOutcome::from_success(
            self.broker.sync_tier(&remote_id, account.tier).await,
        );
        Ok((account, outcome))
    }

    /// Verify credentials and build the session principal.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` or `AuthError::AccountInactive`.
    pub async fn login(&self, login: &str, password: &str) -> Result<CurrentAccount, AuthError> {
        let account = AuthService::new(self.accounts)
            .authenticate(login, password)
            .await?;
        info!(account_id = %account.id, "Login succeeded");
        Ok(CurrentAccount::from(&account))
    }

    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the account no longer exists.
    pub async fn profile(&self, id: AccountId) -> Result<Account, AuthError> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Update email and names, then push them to the broker.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailInUse` if another account has the address.
    #[instrument(skip(self, form))]
    pub async fn update_profile(
        &self,
        id: AccountId,
        form: &ProfileForm,
    ) -> Result<(Account, SyncOutcome), AuthError> {
        let email = Email::parse(&form.email)?;
        if self.accounts.email_taken_by_other(&email, id).await? {
            return Err(AuthError::EmailInUse);
        }

        let update = ProfileUpdate {
            email,
            first_name: form.first_name.trim().to_owned(),
            last_name: form.last_name.trim().to_owned(),
        };
        let account = self
            .accounts
            .update_profile(id, &update)
            .await
            .map_err(|e| match e {
                crate::db::RepositoryError::Conflict(_) => AuthError::EmailInUse,
                other => AuthError::from_write(other),
            })?;

        let outcome = if account.linked_remote_id().is_some() {
            SyncOutcome::from_success(self.broker.update_profile(&account).await)
        } else {
            SyncOutcome::NotLinked
        };
        Ok((account, outcome))
    }

    /// Change the password after verifying the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IncorrectPassword` if the current password is wrong.
    #[instrument(skip(self, form))]
    pub async fn change_password(
        &self,
        id: AccountId,
        form: &PasswordChange,
    ) -> Result<SyncOutcome, AuthError> {
        let account = self.profile(id).await?;
        verify_password(&form.current_password, &account.password_hash)
            .map_err(|_| AuthError::IncorrectPassword)?;
        validate_new_password(&form.new_password, &form.confirm_password)?;

        let hash = hash_password(&form.new_password)?;
        self.accounts
            .update_password_hash(id, &hash)
            .await
            .map_err(AuthError::from_write)?;
        info!("Password changed");

        Ok(match account.linked_remote_id() {
            Some(remote_id) => SyncOutcome::from_success(
                self.broker
                    .reset_password(remote_id, &form.new_password)
                    .await,
            ),
            None => SyncOutcome::NotLinked,
        })
    }

    /// Deactivate the account and disable its broker user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the account no longer exists.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: AccountId) -> Result<(Account, SyncOutcome), AuthError> {
        let account = self
            .accounts
            .set_active(id, false)
            .await
            .map_err(AuthError::from_write)?;
        info!("Account deactivated");

        let outcome = self.push_enabled(&account).await;
        Ok((account, outcome))
    }

    /// Reactivate a deactivated account given its email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email or wrong
    /// password, and `AuthError::AlreadyActive` if the account is active.
    #[instrument(skip(self, password))]
    pub async fn reactivate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Account, SyncOutcome), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let account = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &account.password_hash)?;

        if account.is_active {
            return Err(AuthError::AlreadyActive);
        }

        let account = self
            .accounts
            .set_active(account.id, true)
            .await
            .map_err(AuthError::from_write)?;
        info!(account_id = %account.id, "Account reactivated");

        let outcome = self.push_enabled(&account).await;
        Ok((account, outcome))
    }

    async fn push_enabled(&self, account: &Account) -> SyncOutcome {
        match account.linked_remote_id() {
            Some(remote_id) => SyncOutcome::from_success(
                self.broker.set_enabled(remote_id, account.is_active).await,
            ),
            None => SyncOutcome::NotLinked,
        }
    }
}
