//! Menu and purchase record operations.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use foodi_core::{AccountId, MenuItemId, OrderId, OrderStatus};

use crate::db::{MenuRepository, OrderRepository, RepositoryError};
use crate::models::{MenuItem, NewOrder, Order, OrderLine, OrderReport};

/// Largest quantity of one dish per order line.
pub const MAX_QUANTITY: u32 = 99;

/// Number of orders shown on the reporting dashboard.
pub const RECENT_ORDERS: i64 = 10;

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("An order needs at least one item.")]
    Empty,

    #[error("Quantity must be between 1 and {MAX_QUANTITY}.")]
    InvalidQuantity,

    #[error("Menu item {0} does not exist.")]
    UnknownItem(MenuItemId),

    #[error("{0} is not available right now.")]
    Unavailable(String),

    #[error("order not found")]
    NotFound,

    #[error("An order cannot move from {from} to {to}.")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OrderItemRequest {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
}

/// A new order as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub items: Vec<OrderItemRequest>,
}

pub struct OrderService<'a> {
    menu: MenuRepository<'a>,
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            menu: MenuRepository::new(pool),
            orders: OrderRepository::new(pool),
        }
    }

    /// Dishes currently offered.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn menu(&self) -> Result<Vec<MenuItem>, OrderError> {
        Ok(self.menu.list_available().await?)
    }

    /// Place an order in the `pending` state for `account`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the request names unknown or withdrawn
    /// dishes or an out-of-range quantity.
    #[instrument(skip(self, request), fields(lines = request.items.len()))]
    pub async fn place_order(
        &self,
        account: AccountId,
        request: &PlaceOrder,
    ) -> Result<Order, OrderError> {
        let ids: Vec<MenuItemId> = request.items.iter().map(|i| i.menu_item_id).collect();
        let menu = self.menu.get_many(&ids).await?;
        let (lines, total) = build_lines(&menu, &request.items)?;

        let order = self
            .orders
            .create(NewOrder {
                account_id: account,
                lines,
                total,
            })
            .await?;
        info!(order_id = %order.id, total = %order.total, "Order placed");
        Ok(order)
    }

    /// Orders of one account, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn history(&self, account: AccountId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_account(account).await?)
    }

    /// Move an order one step forward, to `to` or else to the next status.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` if `to` is not the next status
    /// or the order is already delivered.
    #[instrument(skip(self))]
    pub async fn advance_status(
        &self,
        id: OrderId,
        to: Option<OrderStatus>,
    ) -> Result<Order, OrderError> {
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;
        let to = to.or_else(|| order.status.next()).unwrap_or(order.status);
        check_transition(order.status, to)?;

        let order = self.orders.update_status(id, order.status, to).await?;
        info!(status = %order.status, "Order status advanced");
        Ok(order)
    }

    /// Figures for the reporting dashboard.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn report(&self) -> Result<OrderReport, OrderError> {
        let summary = self.orders.summary().await?;
        let recent = self.orders.recent(RECENT_ORDERS).await?;
        let menu_items = i64::try_from(self.menu.list_all().await?.len()).unwrap_or(i64::MAX);

        Ok(OrderReport {
            order_count: summary.order_count,
            revenue: summary.revenue,
            by_status: summary.by_status,
            menu_items,
            recent,
        })
    }
}

/// Snapshot menu entries into order lines and compute the total.
///
/// Repeated dishes are merged into one line.
///
/// # Errors
///
/// Returns a validation error for an empty request, a quantity outside
/// 1..=99, or a dish that is unknown or not available.
pub fn build_lines(
    menu: &[MenuItem],
    requested: &[OrderItemRequest],
) -> Result<(Vec<OrderLine>, Decimal), OrderError> {
    if requested.is_empty() {
        return Err(OrderError::Empty);
    }

    let by_id: HashMap<MenuItemId, &MenuItem> = menu.iter().map(|m| (m.id, m)).collect();
    let mut lines: Vec<OrderLine> = Vec::with_capacity(requested.len());

    for request in requested {
        if !(1..=MAX_QUANTITY).contains(&request.quantity) {
            return Err(OrderError::InvalidQuantity);
        }
        let item = by_id
            .get(&request.menu_item_id)
            .ok_or(OrderError::UnknownItem(request.menu_item_id))?;
        if !item.is_available {
            return Err(OrderError::Unavailable(item.name.clone()));
        }

        if let Some(line) = lines.iter_mut().find(|l| l.menu_item_id == item.id) {
            line.quantity += request.quantity;
            if line.quantity > MAX_QUANTITY {
                return Err(OrderError::InvalidQuantity);
            }
        } else {
            lines.push(OrderLine {
                menu_item_id: item.id,
                name: item.name.clone(),
                quantity: request.quantity,
                unit_price: item.price.amount(),
            });
        }
    }

    let total = lines.iter().map(OrderLine::subtotal).sum();
    Ok((lines, total))
}

/// # Errors
///
/// Returns `OrderError::InvalidTransition` unless `to` directly follows `from`.
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition { from, to })
    }
}
