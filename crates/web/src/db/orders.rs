//! Purchase record database operations.
//!
//! Line items are stored as a JSONB array on the order row; each line keeps
//! the name and unit price the dish had when the order was placed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use foodi_core::{AccountId, OrderId, OrderStatus};

use super::RepositoryError;
use crate::models::{NewOrder, Order, OrderLine};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    account_id: i32,
    lines: Json<Vec<OrderLine>>,
    total: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid status in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            account_id: AccountId::new(row.account_id),
            lines: row.lines.0,
            total: row.total,
            status,
            created_at: row.created_at,
        })
    }
}

/// Aggregate order figures.
#[derive(Debug, Clone, Default)]
pub struct OrderSummary {
    pub order_count: i64,
    pub revenue: Decimal,
    pub by_status: BTreeMap<String, i64>,
}

/// Repository for purchase record operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new order in the `pending` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "INSERT INTO foodi.purchase_order (account_id, lines, total, status) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, account_id, lines, total, status, created_at",
        )
        .bind(order.account_id)
        .bind(Json(&order.lines))
        .bind(order.total)
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Orders placed by one account, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_account(&self, account: AccountId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, account_id, lines, total, status, created_at \
             FROM foodi.purchase_order WHERE account_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(account)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(
            "SELECT id, account_id, lines, total, status, created_at \
             FROM foodi.purchase_order WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    /// Move an order from `from` to `to`.
    ///
    /// The update only applies while the order is still in `from`.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the order is no longer in `from`.
    pub async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(
            "UPDATE foodi.purchase_order SET status = $3 \
             WHERE id = $1 AND status = $2 \
             RETURNING id, account_id, lines, total, status, created_at",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict(format!("order {id} is no longer {from}")))?
        .try_into()
    }

    /// Most recent orders across all accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, account_id, lines, total, status, created_at \
             FROM foodi.purchase_order ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Order count, revenue and per-status counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn summary(&self) -> Result<OrderSummary, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, i64, Decimal)>(
            "SELECT status, COUNT(*), COALESCE(SUM(total), 0) \
             FROM foodi.purchase_order GROUP BY status",
        )
        .fetch_all(self.pool)
        .await?;

        let mut summary = OrderSummary::default();
        for (status, count, revenue) in rows {
            summary.order_count += count;
            summary.revenue += revenue;
            summary.by_status.insert(status, count);
        }
        Ok(summary)
    }
}
