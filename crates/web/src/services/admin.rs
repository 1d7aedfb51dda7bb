//! Account administration.
//!
//! Tier gates are enforced by the route extractors; this service assumes the
//! caller is allowed to perform the operation.

use serde::Serialize;
use tracing::{info, instrument};

use foodi_core::{AccountId, PermissionTier, TierInfo, normalize_role_labels};

use super::accounts::SyncOutcome;
use super::auth::AuthError;
use crate::broker::IdentityBroker;
use crate::db::AccountStore;
use crate::models::{Account, AccountStats};

/// One selectable tier on the account detail page.
#[derive(Debug, Clone, Serialize)]
pub struct TierOption {
    pub tier: PermissionTier,
    #[serde(flatten)]
    pub info: TierInfo,
    pub selected: bool,
}

/// Everything the account detail page shows.
#[derive(Debug, Clone, Serialize)]
pub struct AccountDetail {
    pub account: Account,
    pub tiers: Vec<TierOption>,
    /// Role labels defined on the broker, possibly stale by a few minutes.
    pub available_roles: Vec<String>,
}

pub struct AdminService<'a, S, B> {
    accounts: &'a S,
    broker: &'a B,
}

impl<'a, S: AccountStore, B: IdentityBroker> AdminService<'a, S, B> {
    #[must_use]
    pub const fn new(accounts: &'a S, broker: &'a B) -> Self {
        Self { accounts, broker }
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn dashboard(&self) -> Result<AccountStats, AuthError> {
        Ok(self.accounts.stats().await?)
    }

    /// All accounts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AuthError> {
        Ok(self.accounts.list_all().await?)
    }

    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the account does not exist.
    pub async fn account_detail(&self, id: AccountId) -> Result<AccountDetail, AuthError> {
        let account = self.find(id).await?;
        let tiers = PermissionTier::ALL
            .iter()
            .map(|&tier| TierOption {
                tier,
                info: tier.info(),
                selected: tier == account.tier,
            })
            .collect();
        let available_roles = self.broker.available_roles().await;

        Ok(AccountDetail {
            account,
            tiers,
            available_roles,
        })
    }

    /// Flip the active flag and mirror it on the broker.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the account does not exist.
    #[instrument(skip(self))]
    pub async fn toggle_status(&self, id: AccountId) -> Result<(Account, SyncOutcome), AuthError> {
        let account = self.find(id).await?;
        let account = self
            .accounts
            .set_active(id, !account.is_active)
            .await
            .map_err(AuthError::from_write)?;
        info!(active = account.is_active, "Account status toggled");

        let outcome = match account.linked_remote_id() {
            Some(remote_id) => SyncOutcome::from_success(
                self.broker.set_enabled(remote_id, account.is_active).await,
            ),
            None => SyncOutcome::NotLinked,
        };
        Ok((account, outcome))
    }

    /// Set the permission tier and mirror it as the broker realm role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the account does not exist.
    #[instrument(skip(self))]
    pub async fn set_tier(
        &self,
        id: AccountId,
        tier: PermissionTier,
    ) -> Result<(Account, SyncOutcome), AuthError> {
        let account = self
            .accounts
            .set_tier(id, tier)
            .await
            .map_err(AuthError::from_write)?;
        info!(tier = %tier, "Account tier updated");

        let outcome = match account.linked_remote_id() {
            Some(remote_id) => SyncOutcome::from_success(self.broker.sync_tier(remote_id, tier).await),
            None => SyncOutcome::NotLinked,
        };
        Ok((account, outcome))
    }

    /// Replace the broker role labels of an account.
    ///
    /// Labels are normalized before they are stored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the account does not exist.
    #[instrument(skip(self, labels))]
    pub async fn set_remote_roles(
        &self,
        id: AccountId,
        labels: &[String],
    ) -> Result<(Account, SyncOutcome), AuthError> {
        let labels = normalize_role_labels(labels);
        let account = self
            .accounts
            .set_remote_roles(id, &labels)
            .await
            .map_err(AuthError::from_write)?;
        info!(labels = ?labels, "Broker role labels updated");

        let outcome = match account.linked_remote_id() {
            Some(remote_id) => {
                SyncOutcome::from_success(self.broker.replace_roles(remote_id, &labels).await)
            }
            None => SyncOutcome::NotLinked,
        };
        Ok((account, outcome))
    }

    /// Push profile and tier of a linked account to the broker again.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the account does not exist.
    #[instrument(skip(self))]
    pub async fn resync(&self, id: AccountId) -> Result<(Account, SyncOutcome), AuthError> {
        let account = self.find(id).await?;
        let Some(remote_id) = account.linked_remote_id() else {
            return Ok((account, SyncOutcome::NotLinked));
        };

        let ok = self.broker.update_profile(&account).await
            && self.broker.sync_tier(remote_id, account.tier).await;
        info!(ok, "Account resynchronized");
        Ok((account, SyncOutcome::from_success(ok)))
    }

    /// Drop the cached broker role labels.
    pub async fn refresh_role_cache(&self) {
        self.broker.invalidate_role_cache().await;
    }

    async fn find(&self, id: AccountId) -> Result<Account, AuthError> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or(AuthError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::accounts::{AccountService, Registration};
    use crate::services::testing::{MemoryAccountStore, RecordingBroker};

    async fn seeded(store: &MemoryAccountStore, linked: bool) -> Account {
        let broker = if linked {
            RecordingBroker::default()
        } else {
            RecordingBroker::failing()
        };
        let form = Registration {
            handle: "alice".to_string(),
            email: "a@x.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: String::new(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        };
        AccountService::new(store, &broker)
            .register(&form)
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_toggle_status_twice_restores() {
        let store = MemoryAccountStore::default();
        let account = seeded(&store, true).await;
        let broker = RecordingBroker::default();
        let admin = AdminService::new(&store, &broker);

        let (off, _) = admin.toggle_status(account.id).await.unwrap();
        assert!(!off.is_active);
        assert!(off.deactivated_at.is_some());

        let (on, outcome) = admin.toggle_status(account.id).await.unwrap();
        assert!(on.is_active);
        assert!(on.deactivated_at.is_none());
        assert_eq!(outcome, SyncOutcome::Synced);
        assert_eq!(
            broker.calls(),
            vec!["enabled remote-1 false", "enabled remote-1 true"]
        );
    }

    #[tokio::test]
    async fn test_set_tier_mirrors_realm_role() {
        let store = MemoryAccountStore::default();
        let account = seeded(&store, true).await;
        let broker = RecordingBroker::default();
        let admin = AdminService::new(&store, &broker);

        let (updated, outcome) = admin
            .set_tier(account.id, PermissionTier::Lead)
            .await
            .unwrap();

        assert_eq!(updated.tier, PermissionTier::Lead);
        assert_eq!(outcome, SyncOutcome::Synced);
        assert_eq!(broker.calls(), vec!["tier remote-1 lead"]);
    }

    #[tokio::test]
    async fn test_set_remote_roles_normalizes_and_survives_failure() {
        let store = MemoryAccountStore::default();
        let account = seeded(&store, true).await;
        let broker = RecordingBroker::failing();
        let admin = AdminService::new(&store, &broker);

        let labels = vec![" Kitchen".to_string(), "driver".to_string(), "kitchen".to_string()];
        let (updated, outcome) = admin.set_remote_roles(account.id, &labels).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Failed);
        assert_eq!(updated.remote_roles, vec!["driver", "kitchen"]);
        assert_eq!(store.get(account.id).remote_roles, vec!["driver", "kitchen"]);
    }

    #[tokio::test]
    async fn test_resync_requires_link() {
        let store = MemoryAccountStore::default();
        let account = seeded(&store, false).await;
        let broker = RecordingBroker::default();
        let admin = AdminService::new(&store, &broker);

        let (_, outcome) = admin.resync(account.id).await.unwrap();

        assert_eq!(outcome, SyncOutcome::NotLinked);
        assert!(broker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_resync_pushes_profile_and_tier() {
        let store = MemoryAccountStore::default();
        let account = seeded(&store, true).await;
        let broker = RecordingBroker::default();
        let admin = AdminService::new(&store, &broker);

        let (_, outcome) = admin.resync(account.id).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Synced);
        assert_eq!(broker.calls(), vec!["update alice", "tier remote-1 agent"]);
    }

    #[tokio::test]
    async fn test_detail_lists_tiers_and_roles() {
        let store = MemoryAccountStore::default();
        let account = seeded(&store, true).await;
        let broker = RecordingBroker::with_roles(&["driver"]);
        let admin = AdminService::new(&store, &broker);

        let detail = admin.account_detail(account.id).await.unwrap();

        assert_eq!(detail.tiers.len(), 4);
        assert!(detail.tiers[0].selected);
        assert_eq!(detail.tiers[2].info.display_name, "Administrator");
        assert_eq!(detail.available_roles, vec!["driver"]);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let store = MemoryAccountStore::default();
        let broker = RecordingBroker::default();
        let admin = AdminService::new(&store, &broker);

        assert!(matches!(
            admin.toggle_status(AccountId::new(42)).await,
            Err(AuthError::NotFound)
        ));
        assert!(matches!(
            admin.set_tier(AccountId::new(42), PermissionTier::Head).await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_refresh_role_cache() {
        let store = MemoryAccountStore::default();
        let broker = RecordingBroker::default();
        AdminService::new(&store, &broker).refresh_role_cache().await;
        assert_eq!(broker.calls(), vec!["invalidate"]);
    }
}
