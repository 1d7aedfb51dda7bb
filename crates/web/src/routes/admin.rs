//! Account administration route handlers.
//!
//! Reading is open to Admin and above; changing status, tier and broker role
//! labels needs Head.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use foodi_core::{AccountId, PermissionTier};

use crate::error::{AppError, MessageResponse, Result};
use crate::middleware::{RequireAdmin, RequireHead};
use crate::models::{Account, AccountStats};
use crate::routes::Input;
use crate::services::accounts::SyncOutcome;
use crate::services::admin::{AccountDetail, AdminService};
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Tier form data.
#[derive(Debug, Deserialize)]
pub struct TierForm {
    pub tier: String,
}

/// Broker role labels, as a JSON array or a comma-separated form field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RoleList {
    List(Vec<String>),
    Joined(String),
}

impl RoleList {
    fn into_labels(self) -> Vec<String> {
        match self {
            Self::List(labels) => labels,
            Self::Joined(joined) => joined.split(',').map(str::to_owned).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BrokerRolesForm {
    #[serde(default = "no_roles")]
    pub roles: RoleList,
}

const fn no_roles() -> RoleList {
    RoleList::List(Vec::new())
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub stats: AccountStats,
    pub recent: Vec<Account>,
}

/// Number of accounts listed on the dashboard.
const DASHBOARD_RECENT: usize = 5;

/// Map an unknown account to the admin console wording.
fn user_not_found(err: AuthError) -> AppError {
    match err {
        AuthError::NotFound => AppError::NotFound("User".to_string()),
        other => other.into(),
    }
}

/// Dashboard: account counts and the newest accounts.
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Dashboard>> {
    let admin = AdminService::new(state.accounts(), state.broker());
    let stats = admin.dashboard().await?;
    let mut recent = admin.list_accounts().await?;
    recent.truncate(DASHBOARD_RECENT);
    Ok(Json(Dashboard { stats, recent }))
}

/// All accounts, newest first.
pub async fn users(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Account>>> {
    let accounts = AdminService::new(state.accounts(), state.broker())
        .list_accounts()
        .await?;
    Ok(Json(accounts))
}

/// One account with the tier table and the broker role labels.
pub async fn user_detail(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<AccountId>,
) -> Result<Json<AccountDetail>> {
    let detail = AdminService::new(state.accounts(), state.broker())
        .account_detail(id)
        .await
        .map_err(user_not_found)?;
    Ok(Json(detail))
}

/// Activate or deactivate an account.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn toggle_status(
    State(state): State<AppState>,
    RequireHead(admin): RequireHead,
    Path(id): Path<AccountId>,
) -> Result<MessageResponse> {
    let (account, outcome) = AdminService::new(state.accounts(), state.broker())
        .toggle_status(id)
        .await
        .map_err(user_not_found)?;

    let status = if account.is_active { "active" } else { "inactive" };
    Ok(MessageResponse::with_outcome(
        format!("User {} is now {status}.", account.handle),
        outcome,
        "Status updated but could not sync with Keycloak.",
    ))
}

/// Change the permission tier.
#[instrument(skip(state, admin, form), fields(admin_id = %admin.id))]
pub async fn set_tier(
    State(state): State<AppState>,
    RequireHead(admin): RequireHead,
    Path(id): Path<AccountId>,
    Input(form): Input<TierForm>,
) -> Result<MessageResponse> {
    let tier: PermissionTier = form
        .tier
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid role specified.".to_string()))?;

    let (account, outcome) = AdminService::new(state.accounts(), state.broker())
        .set_tier(id, tier)
        .await
        .map_err(user_not_found)?;

    Ok(MessageResponse::with_outcome(
        format!(
            "User {} role updated to {}.",
            account.handle,
            tier.info().display_name
        ),
        outcome,
        "Role updated but could not sync with Keycloak.",
    ))
}

/// Replace the broker role labels of an account.
#[instrument(skip(state, admin, form), fields(admin_id = %admin.id))]
pub async fn set_broker_roles(
    State(state): State<AppState>,
    RequireHead(admin): RequireHead,
    Path(id): Path<AccountId>,
    Input(form): Input<BrokerRolesForm>,
) -> Result<MessageResponse> {
    let labels = form.roles.into_labels();
    let (account, outcome) = AdminService::new(state.accounts(), state.broker())
        .set_remote_roles(id, &labels)
        .await
        .map_err(user_not_found)?;

    let handle = &account.handle;
    let message = match outcome {
        SyncOutcome::Synced => format!("Keycloak roles updated successfully for {handle}."),
        SyncOutcome::NotLinked => {
            format!("Keycloak roles updated for {handle} (not yet synced to Keycloak).")
        }
        SyncOutcome::Failed => format!("Keycloak roles updated for {handle}."),
    };
    Ok(MessageResponse::with_outcome(
        message,
        outcome,
        "Keycloak roles updated in database, but sync to Keycloak failed.",
    ))
}

/// Push a linked account to the broker again.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn resync(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<AccountId>,
) -> Result<MessageResponse> {
    let (account, outcome) = AdminService::new(state.accounts(), state.broker())
        .resync(id)
        .await
        .map_err(user_not_found)?;

    Ok(match outcome {
        SyncOutcome::Synced => {
            MessageResponse::ok(format!("User {} successfully resynced to Keycloak.", account.handle))
        }
        SyncOutcome::NotLinked => MessageResponse {
            message: format!("User {} was not resynced.", account.handle),
            warning: Some("User has no Keycloak ID. Cannot sync.".to_string()),
        },
        SyncOutcome::Failed => MessageResponse {
            message: format!("User {} was not resynced.", account.handle),
            warning: Some("Failed to resync user to Keycloak.".to_string()),
        },
    })
}

/// Drop the cached broker role labels so the next read fetches them again.
pub async fn refresh_roles(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> MessageResponse {
    AdminService::new(state.accounts(), state.broker())
        .refresh_role_cache()
        .await;
    MessageResponse::ok("Keycloak roles will be reloaded on next use.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_list_accepts_both_shapes() {
        let form: BrokerRolesForm =
            serde_json::from_str(r#"{"roles":["Kitchen","reports"]}"#).unwrap();
        assert_eq!(form.roles.into_labels(), vec!["Kitchen", "reports"]);

        let form: BrokerRolesForm = serde_json::from_str(r#"{"roles":"kitchen, reports"}"#).unwrap();
        assert_eq!(form.roles.into_labels(), vec!["kitchen", " reports"]);

        let form: BrokerRolesForm = serde_json::from_str("{}").unwrap();
        assert!(form.roles.into_labels().is_empty());
    }

    #[test]
    fn test_unknown_account_message() {
        let err = user_not_found(AuthError::NotFound);
        assert!(matches!(err, AppError::NotFound(ref what) if what == "User"));
    }
}
