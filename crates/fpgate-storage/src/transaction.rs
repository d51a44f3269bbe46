//! Transaction-aware operations for the compound record updates.
//!
//! A successful verify touches both tables, as does a delete. These
//! functions take an open SQLite transaction so the caller can commit both
//! writes together or drop the transaction to roll them back.
//!
//! # Usage Pattern
//!
//! ```no_run
//! use fpgate_storage::{Database, DatabaseConfig, transaction};
//! use chrono::Utc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("fpgate.db")).await?;
//!
//! let mut tx = db.pool().begin().await?;
//! transaction::record_access(&mut tx, 12, Utc::now(), 87).await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::StoreResult;
use crate::models::AccessStatus;
use crate::repositories::{access_log, identity};
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};

/// Append a log entry within a transaction
///
/// Returns the auto-generated `log_id`.
pub async fn append_access_log(
    tx: &mut Transaction<'_, Sqlite>,
    fingerprint_id: i64,
    timestamp: DateTime<Utc>,
    confidence: i32,
    status: AccessStatus,
) -> StoreResult<i64> {
    access_log::insert_entry(&mut **tx, fingerprint_id, timestamp, confidence, status).await
}

/// Record a granted verify: bump `last_access_at` and append `ACCESS_GRANTED`
///
/// A missing identity row still gets its log entry; the name then reads
/// as unknown.
pub async fn record_access(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    timestamp: DateTime<Utc>,
    confidence: i32,
) -> StoreResult<i64> {
    identity::set_last_access(&mut **tx, id, timestamp).await?;
    append_access_log(tx, id, timestamp, confidence, AccessStatus::AccessGranted).await
}

/// Record a delete: append `DELETED` and remove the identity row
///
/// Returns the number of identity rows removed (0 or 1).
pub async fn record_deletion(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    timestamp: DateTime<Utc>,
) -> StoreResult<u64> {
    append_access_log(tx, id, timestamp, 0, AccessStatus::Deleted).await?;
    identity::delete_row(&mut **tx, id).await
}
