#![allow(async_fn_in_trait)]

//! The record store contract consumed by the workflow controller.

use crate::connection::Database;
use crate::error::StoreResult;
use crate::models::{AccessLogEntry, AccessStatus, EnrolledIdentity};
use crate::repositories::{
    AccessLogRepository, IdentityRepository, SqliteAccessLogRepository, SqliteIdentityRepository,
};
use crate::transaction;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Durable storage for enrolled identities and the access log.
///
/// Implementations serialize their own writes. The compound operations
/// [`record_access`](RecordStore::record_access) and
/// [`record_deletion`](RecordStore::record_deletion) default to running the
/// two primitive steps in order; implementations that can do better should
/// make them atomic.
pub trait RecordStore {
    async fn insert_identity(&self, identity: &EnrolledIdentity) -> StoreResult<()>;

    async fn update_last_access(&self, id: i64, timestamp: DateTime<Utc>) -> StoreResult<()>;

    /// Rows removed, 0 when the id was not stored.
    async fn delete_identity(&self, id: i64) -> StoreResult<u64>;

    async fn append_access_log(
        &self,
        fingerprint_id: i64,
        timestamp: DateTime<Utc>,
        confidence: i32,
        status: AccessStatus,
    ) -> StoreResult<i64>;

    async fn find_identity_name(&self, id: i64) -> StoreResult<Option<String>>;

    async fn find_identity(&self, id: i64) -> StoreResult<Option<EnrolledIdentity>>;

    /// Ordered by id.
    async fn list_identities(&self) -> StoreResult<Vec<EnrolledIdentity>>;

    /// Newest first.
    async fn list_recent_logs(&self, limit: i64) -> StoreResult<Vec<AccessLogEntry>>;

    /// Update `last_access_at` and append `ACCESS_GRANTED`.
    async fn record_access(
        &self,
        id: i64,
        timestamp: DateTime<Utc>,
        confidence: i32,
    ) -> StoreResult<i64> {
        self.update_last_access(id, timestamp).await?;
        self.append_access_log(id, timestamp, confidence, AccessStatus::AccessGranted)
            .await
    }

    /// Append `DELETED`, then remove the identity row.
    async fn record_deletion(&self, id: i64, timestamp: DateTime<Utc>) -> StoreResult<u64> {
        self.append_access_log(id, timestamp, 0, AccessStatus::Deleted)
            .await?;
        self.delete_identity(id).await
    }
}

/// [`RecordStore`] backed by the SQLite [`Database`].
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    db: Database,
    identities: SqliteIdentityRepository,
    logs: SqliteAccessLogRepository,
}

impl SqliteRecordStore {
    pub fn new(db: Database) -> Self {
        let identities = SqliteIdentityRepository::new(db.pool().clone());
        let logs = SqliteAccessLogRepository::new(db.pool().clone());
        Self {
            db,
            identities,
            logs,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

impl RecordStore for SqliteRecordStore {
    async fn insert_identity(&self, identity: &EnrolledIdentity) -> StoreResult<()> {
        self.identities.insert(identity).await?;
        debug!(id = identity.id, name = %identity.name, "Identity stored");
        Ok(())
    }

    async fn update_last_access(&self, id: i64, timestamp: DateTime<Utc>) -> StoreResult<()> {
        self.identities.update_last_access(id, timestamp).await
    }

    async fn delete_identity(&self, id: i64) -> StoreResult<u64> {
        self.identities.delete(id).await
    }

    async fn append_access_log(
        &self,
        fingerprint_id: i64,
        timestamp: DateTime<Utc>,
        confidence: i32,
        status: AccessStatus,
    ) -> StoreResult<i64> {
        let log_id = self
            .logs
            .append(fingerprint_id, timestamp, confidence, status)
            .await?;
        debug!(log_id, fingerprint_id, %status, "Access log appended");
        Ok(log_id)
    }

    async fn find_identity_name(&self, id: i64) -> StoreResult<Option<String>> {
        self.identities.find_name(id).await
    }

    async fn find_identity(&self, id: i64) -> StoreResult<Option<EnrolledIdentity>> {
        self.identities.find_by_id(id).await
    }

    async fn list_identities(&self) -> StoreResult<Vec<EnrolledIdentity>> {
        self.identities.list_all().await
    }

    async fn list_recent_logs(&self, limit: i64) -> StoreResult<Vec<AccessLogEntry>> {
        self.logs.recent(limit).await
    }

    async fn record_access(
        &self,
        id: i64,
        timestamp: DateTime<Utc>,
        confidence: i32,
    ) -> StoreResult<i64> {
        let mut tx = self.db.pool().begin().await?;
        let log_id = transaction::record_access(&mut tx, id, timestamp, confidence).await?;
        tx.commit().await?;
        debug!(log_id, id, confidence, "Access recorded");
        Ok(log_id)
    }

    async fn record_deletion(&self, id: i64, timestamp: DateTime<Utc>) -> StoreResult<u64> {
        let mut tx = self.db.pool().begin().await?;
        let removed = transaction::record_deletion(&mut tx, id, timestamp).await?;
        tx.commit().await?;
        debug!(id, removed, "Deletion recorded");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use fpgate_core::FingerprintId;

    async fn store() -> SqliteRecordStore {
        SqliteRecordStore::new(Database::in_memory().await.unwrap())
    }

    fn identity(id: i64, name: &str) -> EnrolledIdentity {
        EnrolledIdentity::new(FingerprintId::new(id).unwrap(), name, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_then_list() {
        let store = store().await;
        store.insert_identity(&identity(3, "Caio")).await.unwrap();
        store.insert_identity(&identity(1, "Ana")).await.unwrap();

        let names: Vec<String> = store
            .list_identities()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Ana", "Caio"]);
        assert_eq!(
            store.find_identity_name(3).await.unwrap().as_deref(),
            Some("Caio")
        );
    }

    #[tokio::test]
    async fn test_duplicate_id() {
        let store = store().await;
        store.insert_identity(&identity(9, "A")).await.unwrap();
        let err = store.insert_identity(&identity(9, "B")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { id: 9 }));
    }

    #[tokio::test]
    async fn test_record_access_updates_and_logs() {
        let store = store().await;
        let ana = identity(12, "Ana");
        store.insert_identity(&ana).await.unwrap();

        let at = ana.registered_at + chrono::Duration::seconds(10);
        store.record_access(12, at, 80).await.unwrap();

        let found = store.find_identity(12).await.unwrap().unwrap();
        assert_eq!(found.last_access_at, at);

        let logs = store.list_recent_logs(5).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].name, "Ana");
        assert!(logs[0].was_granted());
    }

    #[tokio::test]
    async fn test_record_deletion_keeps_log_after_row_is_gone() {
        let store = store().await;
        store.insert_identity(&identity(20, "Bia")).await.unwrap();

        assert_eq!(store.record_deletion(20, Utc::now()).await.unwrap(), 1);
        assert!(store.find_identity(20).await.unwrap().is_none());

        let logs = store.list_recent_logs(5).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].fingerprint_id, 20);
        assert_eq!(logs[0].status, "DELETED");
        assert!(logs[0].is_unknown());
    }

    #[tokio::test]
    async fn test_closed_store_reports_connection_lost() {
        let store = store().await;
        store.close().await;

        let err = store
            .append_access_log(0, Utc::now(), 0, AccessStatus::AccessDenied)
            .await
            .unwrap_err();
        assert!(err.is_connection_lost());
    }
}
