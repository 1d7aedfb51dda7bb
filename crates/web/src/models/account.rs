//! Account domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use foodi_core::{AccountId, Email, Handle, PermissionTier};

/// A local account.
///
/// The local record is authoritative for the permission tier. `remote_id` is
/// the broker-assigned identifier once the account has been created there;
/// `synced` records whether that creation succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub handle: Handle,
    pub email: Email,
    /// Argon2 PHC string. Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub tier: PermissionTier,
    /// Broker client-role labels, normalized (trimmed, lowercase, sorted).
    pub remote_roles: Vec<String>,
    pub is_active: bool,
    pub remote_id: Option<String>,
    pub synced: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Display name built from the profile, falling back to the handle.
    #[must_use]
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.handle.to_string()
        } else {
            name.to_owned()
        }
    }

    /// The broker id, if the account is linked to a broker user.
    #[must_use]
    pub fn linked_remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub handle: Handle,
    pub email: Email,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub tier: PermissionTier,
}

/// Editable profile fields.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
}

/// Account counts for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccountStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub synced: i64,
}
