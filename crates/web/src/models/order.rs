//! Purchase record domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use foodi_core::{AccountId, MenuItemId, OrderId, OrderStatus};

/// One line of a purchase record.
///
/// Name and unit price are copied from the menu when the order is placed, so
/// later menu edits never change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub menu_item_id: MenuItemId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderLine {
    /// `quantity * unit_price`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A purchase record.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a purchase record.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub account_id: AccountId,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
}

/// Order figures for the reporting dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReport {
    pub order_count: i64,
    pub revenue: Decimal,
    pub by_status: BTreeMap<String, i64>,
    pub menu_items: i64,
    pub recent: Vec<Order>,
}
