#![allow(async_fn_in_trait)]

use crate::error::StoreResult;
use crate::models::{AccessLogEntry, AccessStatus};
use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};

/// Repository trait for the access log audit trail
///
/// Entries are append-only. Reads join against `enrolled_identities` so each
/// entry carries the name of whoever holds the slot at read time.
pub trait AccessLogRepository: Send + Sync {
    /// Append an entry, returning its `log_id`
    async fn append(
        &self,
        fingerprint_id: i64,
        timestamp: DateTime<Utc>,
        confidence: i32,
        status: AccessStatus,
    ) -> StoreResult<i64>;

    /// Most recent entries first, at most `limit`
    async fn recent(&self, limit: i64) -> StoreResult<Vec<AccessLogEntry>>;

    /// Number of entries with the given status
    async fn count_by_status(&self, status: AccessStatus) -> StoreResult<i64>;
}

/// SQLite implementation of AccessLogRepository
#[derive(Debug, Clone)]
pub struct SqliteAccessLogRepository {
    pool: SqlitePool,
}

impl SqliteAccessLogRepository {
    /// Create a new SQLite access log repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Insert one entry through any executor, pool or open transaction.
pub(crate) async fn insert_entry<'e, E>(
    executor: E,
    fingerprint_id: i64,
    timestamp: DateTime<Utc>,
    confidence: i32,
    status: AccessStatus,
) -> StoreResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO access_logs (fingerprint_id, timestamp, confidence, status)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(fingerprint_id)
    .bind(timestamp)
    .bind(confidence)
    .bind(status.as_str())
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

const RECENT_LOGS_QUERY: &str = r#"
    SELECT l.log_id, l.fingerprint_id,
           COALESCE(i.name, 'Unknown') AS name,
           l.timestamp, l.confidence, l.status
    FROM access_logs l
    LEFT JOIN enrolled_identities i ON l.fingerprint_id = i.id
    ORDER BY l.timestamp DESC, l.log_id DESC
    LIMIT ?
"#;

impl AccessLogRepository for SqliteAccessLogRepository {
    async fn append(
        &self,
        fingerprint_id: i64,
        timestamp: DateTime<Utc>,
        confidence: i32,
        status: AccessStatus,
    ) -> StoreResult<i64> {
        insert_entry(&self.pool, fingerprint_id, timestamp, confidence, status).await
    }

    async fn recent(&self, limit: i64) -> StoreResult<Vec<AccessLogEntry>> {
        let logs = sqlx::query_as::<_, AccessLogEntry>(RECENT_LOGS_QUERY)
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;

        Ok(logs)
    }

    async fn count_by_status(&self, status: AccessStatus) -> StoreResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM access_logs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0)
    }
}
