//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use foodi_core::{OrderId, OrderStatus};

use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireAuth, RequireLead};
use crate::models::{AccountStats, Order, OrderReport};
use crate::routes::Input;
use crate::services::admin::AdminService;
use crate::services::orders::{OrderService, PlaceOrder};
use crate::state::AppState;

/// Optional explicit target status; the next status when absent.
#[derive(Debug, Default, Deserialize)]
pub struct AdvanceForm {
    pub status: Option<OrderStatus>,
}

/// Reporting dashboard.
#[derive(Debug, Serialize)]
pub struct Reports {
    pub accounts: AccountStats,
    pub orders: OrderReport,
}

/// Order history of the signed-in account.
pub async fn history(
    State(state): State<AppState>,
    RequireAuth(account): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(OrderService::new(state.pool()).history(account.id).await?))
}

/// Place an order.
#[instrument(skip(state, account, request), fields(account_id = %account.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(account): RequireAuth,
    Json(request): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = OrderService::new(state.pool())
        .place_order(account.id, &request)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Move an order to its next status.
#[instrument(skip(state, account, form), fields(account_id = %account.id))]
pub async fn advance(
    State(state): State<AppState>,
    RequireAdmin(account): RequireAdmin,
    Path(id): Path<OrderId>,
    Input(form): Input<AdvanceForm>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool())
        .advance_status(id, form.status)
        .await?;
    Ok(Json(order))
}

/// Reporting dashboard: account counts and order figures.
pub async fn reports(
    State(state): State<AppState>,
    RequireLead(_): RequireLead,
) -> Result<Json<Reports>> {
    let accounts = AdminService::new(state.accounts(), state.broker())
        .dashboard()
        .await?;
    let orders = OrderService::new(state.pool()).report().await?;
    Ok(Json(Reports { accounts, orders }))
}
