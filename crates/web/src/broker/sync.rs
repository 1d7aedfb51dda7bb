//! Best-effort synchronization of local accounts to the broker.

use tracing::{info, instrument, warn};

use foodi_core::PermissionTier;

use super::client::{
    KeycloakAdminClient, NewRemoteUser, PasswordCredential, RemoteUserUpdate, RoleRepresentation,
};
use super::{BrokerError, IdentityBroker, RoleCache, plan_role_changes};
use crate::models::Account;

/// Orchestrates broker calls for account operations.
///
/// Each operation re-uses the client's admin token, issues its calls one after
/// another and logs any failure once. Nothing here retries.
#[derive(Clone)]
pub struct BrokerSync {
    client: KeycloakAdminClient,
    roles: RoleCache,
}

impl BrokerSync {
    #[must_use]
    pub const fn new(client: KeycloakAdminClient, roles: RoleCache) -> Self {
        Self { client, roles }
    }

    async fn try_sync_tier(&self, remote_id: &str, tier: PermissionTier) -> Result<(), BrokerError> {
        let name = tier.as_str();
        if self.client.realm_role(name).await?.is_none() {
            let description = tier.info().description;
            self.client
                .create_realm_role(&RoleRepresentation::named(name, Some(description)))
                .await?;
        }

        let current = self.client.user_realm_roles(remote_id).await?;
        let current_names: Vec<&str> = current.iter().map(|r| r.name.as_str()).collect();
        let managed: Vec<&str> = PermissionTier::ALL.iter().map(|t| t.as_str()).collect();
        let plan = plan_role_changes(&current_names, &[name], &managed);

        let to_remove: Vec<RoleRepresentation> = current
            .into_iter()
            .filter(|r| plan.remove.contains(&r.name.to_lowercase()))
            .collect();
        if !to_remove.is_empty() {
            self.client
                .remove_user_realm_roles(remote_id, &to_remove)
                .await?;
        }

        if !plan.add.is_empty() {
            let role = self
                .client
                .realm_role(name)
                .await?
                .ok_or_else(|| BrokerError::RoleNotFound(name.to_owned()))?;
            self.client.add_user_realm_roles(remote_id, &[role]).await?;
        }
        Ok(())
    }

    async fn try_replace_roles(&self, remote_id: &str, labels: &[String]) -> Result<(), BrokerError> {
        let client_uuid = self.client.client_uuid(self.client.role_client()).await?;
        let defined = self.client.client_roles(&client_uuid).await?;
        let current = self.client.user_client_roles(remote_id, &client_uuid).await?;

        let defined_names: Vec<String> = defined.iter().map(|r| r.name.to_lowercase()).collect();
        let current_names: Vec<String> = current.iter().map(|r| r.name.clone()).collect();
        let plan = plan_role_changes(&current_names, labels, &defined_names);

        let to_remove: Vec<RoleRepresentation> = current
            .into_iter()
            .filter(|r| plan.remove.contains(&r.name.to_lowercase()))
            .collect();
        if !to_remove.is_empty() {
            self.client
                .remove_user_client_roles(remote_id, &client_uuid, &to_remove)
                .await?;
        }

        let mut created = false;
        for label in &plan.add {
            let existing = defined
                .iter()
                .find(|r| r.name.eq_ignore_ascii_case(label))
                .cloned();
            let role = if let Some(role) = existing {
                role
            } else {
                self.client.create_client_role(&client_uuid, label).await?;
                created = true;
                self.client.client_role(&client_uuid, label).await?
            };
            self.client
                .add_user_client_roles(remote_id, &client_uuid, &[role])
                .await?;
        }

        if created {
            self.roles.invalidate().await;
        }
        Ok(())
    }

    async fn load_role_labels(&self) -> Result<Vec<String>, BrokerError> {
        let client_uuid = self.client.client_uuid(self.client.role_client()).await?;
        let mut labels: Vec<String> = self
            .client
            .client_roles(&client_uuid)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect();
        labels.sort_unstable();
        Ok(labels)
    }
}

impl IdentityBroker for BrokerSync {
    #[instrument(skip(self, account, password), fields(handle = %account.handle))]
    async fn create_user(&self, account: &Account, password: &str) -> Option<String> {
        let user = NewRemoteUser {
            username: account.handle.as_str(),
            email: account.email.as_str(),
            first_name: &account.first_name,
            last_name: &account.last_name,
            enabled: true,
            email_verified: true,
            credentials: vec![PasswordCredential::permanent(password)],
        };

        match self.client.create_user(&user).await {
            Ok(remote_id) => {
                info!(remote_id = %remote_id, "Created broker user");
                Some(remote_id)
            }
            Err(e) => {
                warn!(error = %e, "Failed to create broker user");
                None
            }
        }
    }

    #[instrument(skip(self, account), fields(handle = %account.handle))]
    async fn update_profile(&self, account: &Account) -> bool {
        let Some(remote_id) = account.linked_remote_id() else {
            warn!("Account has no broker user id");
            return false;
        };

        let update = RemoteUserUpdate {
            username: account.handle.as_str(),
            email: account.email.as_str(),
            first_name: &account.first_name,
            last_name: &account.last_name,
            enabled: account.is_active,
            email_verified: true,
        };

        match self.client.update_user(remote_id, &update).await {
            Ok(()) => {
                info!(remote_id, "Updated broker user");
                true
            }
            Err(e) => {
                warn!(remote_id, error = %e, "Failed to update broker user");
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn set_enabled(&self, remote_id: &str, enabled: bool) -> bool {
        match self.client.set_enabled(remote_id, enabled).await {
            Ok(()) => {
                info!("Set broker user status");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to set broker user status");
                false
            }
        }
    }

    #[instrument(skip(self, password))]
    async fn reset_password(&self, remote_id: &str, password: &str) -> bool {
        match self.client.reset_password(remote_id, password).await {
            Ok(()) => {
                info!("Reset broker user password");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to reset broker user password");
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn sync_tier(&self, remote_id: &str, tier: PermissionTier) -> bool {
        match self.try_sync_tier(remote_id, tier).await {
            Ok(()) => {
                info!("Synchronized tier role");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to synchronize tier role");
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn replace_roles(&self, remote_id: &str, labels: &[String]) -> bool {
        match self.try_replace_roles(remote_id, labels).await {
            Ok(()) => {
                info!("Replaced broker role labels");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to replace broker role labels");
                false
            }
        }
    }

    async fn available_roles(&self) -> Vec<String> {
        match self.roles.get_or_load(|| self.load_role_labels()).await {
            Ok(labels) => labels.as_ref().clone(),
            Err(e) => {
                warn!(error = %e, "Failed to list broker role labels");
                Vec::new()
            }
        }
    }

    async fn invalidate_role_cache(&self) {
        self.roles.invalidate().await;
        info!("Broker role cache invalidated");
    }
}
