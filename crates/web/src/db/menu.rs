//! Menu database operations.

use rust_decimal::Decimal;
use sqlx::PgPool;

use foodi_core::{MenuItemId, MenuPrice};

use super::RepositoryError;
use crate::models::{MenuItem, NewMenuItem};

#[derive(Debug, sqlx::FromRow)]
struct MenuItemRow {
    id: i32,
    name: String,
    description: String,
    price: Decimal,
    image_url: String,
    is_available: bool,
}

impl TryFrom<MenuItemRow> for MenuItem {
    type Error = RepositoryError;

    fn try_from(row: MenuItemRow) -> Result<Self, Self::Error> {
        let price = MenuPrice::new(row.price).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price for {}: {e}", row.name))
        })?;

        Ok(Self {
            id: MenuItemId::new(row.id),
            name: row.name,
            description: row.description,
            price,
            image_url: row.image_url,
            is_available: row.is_available,
        })
    }
}

/// Repository for menu database operations.
pub struct MenuRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MenuRepository<'a> {
    /// Create a new menu repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Dishes currently offered, by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_available(&self) -> Result<Vec<MenuItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, MenuItemRow>(
            "SELECT id, name, description, price, image_url, is_available \
             FROM foodi.menu_item WHERE is_available ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Every dish, including withdrawn ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> Result<Vec<MenuItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, MenuItemRow>(
            "SELECT id, name, description, price, image_url, is_available \
             FROM foodi.menu_item ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: MenuItemId) -> Result<Option<MenuItem>, RepositoryError> {
        sqlx::query_as::<_, MenuItemRow>(
            "SELECT id, name, description, price, image_url, is_available \
             FROM foodi.menu_item WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    /// Fetch several dishes at once. Missing ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_many(&self, ids: &[MenuItemId]) -> Result<Vec<MenuItem>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(MenuItemId::as_i32).collect();
        let rows = sqlx::query_as::<_, MenuItemRow>(
            "SELECT id, name, description, price, image_url, is_available \
             FROM foodi.menu_item WHERE id = ANY($1)",
        )
        .bind(raw)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Insert a dish, or replace the one with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn upsert_by_name(&self, item: &NewMenuItem) -> Result<MenuItem, RepositoryError> {
        let row = sqlx::query_as::<_, MenuItemRow>(
            "INSERT INTO foodi.menu_item (name, description, price, image_url, is_available) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (name) DO UPDATE SET \
                description = EXCLUDED.description, \
                price = EXCLUDED.price, \
                image_url = EXCLUDED.image_url, \
                is_available = EXCLUDED.is_available \
             RETURNING id, name, description, price, image_url, is_available",
        )
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price.amount())
        .bind(&item.image_url)
        .bind(item.is_available)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }
}
