//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use foodi_core::{AccountId, Email, Handle, PermissionTier};

use super::Account;

/// Session-stored principal for the signed-in account.
///
/// Carries the identity claims (id, handle, contact address, names) plus one
/// role claim per permission tier held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAccount {
    pub id: AccountId,
    pub handle: Handle,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<PermissionTier>,
}

impl CurrentAccount {
    /// Highest tier held, `Agent` if none.
    #[must_use]
    pub fn tier(&self) -> PermissionTier {
        self.roles.iter().copied().max().unwrap_or_default()
    }

    /// Whether the principal satisfies a gate requiring `required`.
    #[must_use]
    pub fn has_tier(&self, required: PermissionTier) -> bool {
        self.tier().at_least(required)
    }
}

impl From<&Account> for CurrentAccount {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            handle: account.handle.clone(),
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            roles: vec![account.tier],
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current signed-in account.
    pub const CURRENT_ACCOUNT: &str = "current_account";

    /// Key for the Unix timestamp after which the login is no longer valid.
    pub const LOGIN_EXPIRES_AT: &str = "login_expires_at";
}
