#![allow(async_fn_in_trait)]

use crate::error::{StoreError, StoreResult, is_unique_violation};
use crate::models::EnrolledIdentity;
use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};

/// Repository trait for EnrolledIdentity entity operations
pub trait IdentityRepository: Send + Sync {
    /// Insert a new identity, failing with `DuplicateId` if the slot is taken
    async fn insert(&self, identity: &EnrolledIdentity) -> StoreResult<()>;

    /// Set `last_access_at`; a missing row is not an error
    async fn update_last_access(&self, id: i64, timestamp: DateTime<Utc>) -> StoreResult<()>;

    /// Delete by id, returning the number of rows removed (0 or 1)
    async fn delete(&self, id: i64) -> StoreResult<u64>;

    /// Find identity by id
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<EnrolledIdentity>>;

    /// Find only the name for an id
    async fn find_name(&self, id: i64) -> StoreResult<Option<String>>;

    /// All identities ordered by id
    async fn list_all(&self) -> StoreResult<Vec<EnrolledIdentity>>;
}

pub(crate) async fn set_last_access<'e, E>(
    executor: E,
    id: i64,
    timestamp: DateTime<Utc>,
) -> StoreResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE enrolled_identities SET last_access_at = ? WHERE id = ?")
        .bind(timestamp)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Returns the number of rows removed (0 or 1).
pub(crate) async fn delete_row<'e, E>(executor: E, id: i64) -> StoreResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM enrolled_identities WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// SQLite implementation of IdentityRepository
#[derive(Debug, Clone)]
pub struct SqliteIdentityRepository {
    pool: SqlitePool,
}

impl SqliteIdentityRepository {
    /// Create a new SQLite identity repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl IdentityRepository for SqliteIdentityRepository {
    async fn insert(&self, identity: &EnrolledIdentity) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO enrolled_identities (id, name, registered_at, last_access_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(identity.id)
        .bind(&identity.name)
        .bind(identity.registered_at)
        .bind(identity.last_access_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateId { id: identity.id }
            } else {
                StoreError::from(e)
            }
        })?;

        Ok(())
    }

    async fn update_last_access(&self, id: i64, timestamp: DateTime<Utc>) -> StoreResult<()> {
        set_last_access(&self.pool, id, timestamp).await
    }

    async fn delete(&self, id: i64) -> StoreResult<u64> {
        delete_row(&self.pool, id).await
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<EnrolledIdentity>> {
        let identity = sqlx::query_as::<_, EnrolledIdentity>(
            r#"
            SELECT id, name, registered_at, last_access_at
            FROM enrolled_identities
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn find_name(&self, id: i64) -> StoreResult<Option<String>> {
        let name: Option<(String,)> =
            sqlx::query_as("SELECT name FROM enrolled_identities WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(name.map(|(name,)| name))
    }

    async fn list_all(&self) -> StoreResult<Vec<EnrolledIdentity>> {
        let identities = sqlx::query_as::<_, EnrolledIdentity>(
            r#"
            SELECT id, name, registered_at, last_access_at
            FROM enrolled_identities
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(identities)
    }
}
