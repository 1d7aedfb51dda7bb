//! Account repository backed by `PostgreSQL`.
//!
//! Handle and email uniqueness is enforced case-insensitively by unique
//! indexes on `lower(handle)` and `lower(email)`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use foodi_core::{AccountId, Email, Handle, PermissionTier};

use super::{AccountStore, RepositoryError};
use crate::models::{Account, AccountStats, NewAccount, ProfileUpdate};

macro_rules! account_columns {
    () => {
        "id, handle, email, password_hash, first_name, last_name, tier, remote_roles, \
         is_active, remote_id, synced, created_at, modified_at, deactivated_at"
    };
}

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` account queries.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i32,
    handle: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    tier: String,
    remote_roles: Vec<String>,
    is_active: bool,
    remote_id: Option<String>,
    synced: bool,
    created_at: DateTime<Utc>,
    modified_at: Option<DateTime<Utc>>,
    deactivated_at: Option<DateTime<Utc>>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let handle = Handle::parse(&row.handle).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid handle in database: {e}"))
        })?;
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let tier: PermissionTier = row.tier.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid tier in database: {e}"))
        })?;

        Ok(Self {
            id: AccountId::new(row.id),
            handle,
            email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            tier,
            remote_roles: row.remote_roles,
            is_active: row.is_active,
            remote_id: row.remote_id,
            synced: row.synced,
            created_at: row.created_at,
            modified_at: row.modified_at,
            deactivated_at: row.deactivated_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// `PostgreSQL` implementation of [`AccountStore`].
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    /// Create a new account store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_updated(
        &self,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, AccountRow, sqlx::postgres::PgArguments>,
    ) -> Result<Account, RepositoryError> {
        query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "email"))?
            .ok_or(RepositoryError::NotFound)?
            .try_into()
    }
}

impl AccountStore for PgAccountStore {
    async fn create(&self, input: NewAccount) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(concat!(
            "INSERT INTO foodi.account \
             (handle, email, password_hash, first_name, last_name, tier) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING ",
            account_columns!()
        ))
        .bind(&input.handle)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(input.tier.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "handle or email"))?;

        row.try_into()
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        sqlx::query_as::<_, AccountRow>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM foodi.account WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Option<Account>, RepositoryError> {
        sqlx::query_as::<_, AccountRow>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM foodi.account \
              WHERE lower(handle) = lower($1) OR lower(email) = lower($1) \
              LIMIT 1"
        ))
        .bind(identifier.trim())
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        sqlx::query_as::<_, AccountRow>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM foodi.account WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn exists_with_handle_or_email(
        &self,
        handle: &str,
        email: &Email,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                SELECT 1 FROM foodi.account \
                WHERE lower(handle) = lower($1) OR lower(email) = lower($2) \
             )",
        )
        .bind(handle.trim())
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn email_taken_by_other(
        &self,
        email: &Email,
        except: AccountId,
    ) -> Result<bool, RepositoryError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                SELECT 1 FROM foodi.account WHERE lower(email) = lower($1) AND id <> $2 \
             )",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn update_profile(
        &self,
        id: AccountId,
        update: &ProfileUpdate,
    ) -> Result<Account, RepositoryError> {
        let query = sqlx::query_as::<_, AccountRow>(concat!(
            "UPDATE foodi.account \
             SET email = $2, first_name = $3, last_name = $4, modified_at = now() \
             WHERE id = $1 \
             RETURNING ",
            account_columns!()
        ))
        .bind(id)
        .bind(&update.email)
        .bind(&update.first_name)
        .bind(&update.last_name);
        self.fetch_updated(query).await
    }

    async fn update_password_hash(
        &self,
        id: AccountId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE foodi.account SET password_hash = $2, modified_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_active(&self, id: AccountId, active: bool) -> Result<Account, RepositoryError> {
        let query = sqlx::query_as::<_, AccountRow>(concat!(
            "UPDATE foodi.account \
             SET is_active = $2, \
                 deactivated_at = CASE WHEN $2 THEN NULL ELSE now() END, \
                 modified_at = now() \
             WHERE id = $1 \
             RETURNING ",
            account_columns!()
        ))
        .bind(id)
        .bind(active);
        self.fetch_updated(query).await
    }

    async fn set_tier(
        &self,
        id: AccountId,
        tier: PermissionTier,
    ) -> Result<Account, RepositoryError> {
        let query = sqlx::query_as::<_, AccountRow>(concat!(
            "UPDATE foodi.account SET tier = $2, modified_at = now() WHERE id = $1 RETURNING ",
            account_columns!()
        ))
        .bind(id)
        .bind(tier.as_str());
        self.fetch_updated(query).await
    }

    async fn set_remote_roles(
        &self,
        id: AccountId,
        labels: &[String],
    ) -> Result<Account, RepositoryError> {
        let query = sqlx::query_as::<_, AccountRow>(concat!(
            "UPDATE foodi.account SET remote_roles = $2, modified_at = now() \
             WHERE id = $1 RETURNING ",
            account_columns!()
        ))
        .bind(id)
        .bind(labels);
        self.fetch_updated(query).await
    }

    async fn mark_synced(&self, id: AccountId, remote_id: &str) -> Result<Account, RepositoryError> {
        let query = sqlx::query_as::<_, AccountRow>(concat!(
            "UPDATE foodi.account SET remote_id = $2, synced = TRUE WHERE id = $1 RETURNING ",
            account_columns!()
        ))
        .bind(id)
        .bind(remote_id);
        self.fetch_updated(query).await
    }

    async fn list_all(&self) -> Result<Vec<Account>, RepositoryError> {
        let rows = sqlx::query_as::<_, AccountRow>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM foodi.account ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn stats(&self) -> Result<AccountStats, RepositoryError> {
        let (total, active, synced) = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE is_active), \
                    COUNT(*) FILTER (WHERE synced) \
             FROM foodi.account",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AccountStats {
            total,
            active,
            inactive: total - active,
            synced,
        })
    }
}
