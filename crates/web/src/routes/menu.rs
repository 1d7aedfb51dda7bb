//! Menu listings.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::MenuItem;
use crate::services::orders::OrderService;
use crate::state::AppState;

/// Available dishes, for anyone.
#[instrument(skip(state))]
pub async fn public_menu(State(state): State<AppState>) -> Result<Json<Vec<MenuItem>>> {
    Ok(Json(OrderService::new(state.pool()).menu().await?))
}

/// Available dishes for a signed-in account.
#[instrument(skip(state, account), fields(account_id = %account.id))]
pub async fn menu(
    State(state): State<AppState>,
    RequireAuth(account): RequireAuth,
) -> Result<Json<Vec<MenuItem>>> {
    Ok(Json(OrderService::new(state.pool()).menu().await?))
}
