//! Shared fixtures for workflow tests: a simulated sensor behind a mock
//! transport, and a record store that can be told to fail.

#![allow(dead_code)]
#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use fpgate_device::mock::{MockTransport, MockTransportHandle, SimulatedSensor, SimulatedSensorHandle};
use fpgate_device::{EngineConfig, ProtocolEngine};
use fpgate_storage::{
    AccessLogEntry, AccessStatus, Database, EnrolledIdentity, RecordStore, SqliteRecordStore,
    StoreError, StoreResult,
};
use fpgate_workflow::AccessController;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const TEST_TIMEOUT: Duration = Duration::from_millis(300);

pub fn test_config() -> EngineConfig {
    EngineConfig::default()
        .with_poll_interval(Duration::from_millis(5))
        .with_command_timeout(TEST_TIMEOUT)
}

pub async fn memory_store() -> SqliteRecordStore {
    SqliteRecordStore::new(Database::in_memory().await.unwrap())
}

/// Controller over `sensor` and a fresh in-memory store.
pub async fn setup(
    sensor: SimulatedSensor,
) -> (AccessController<SqliteRecordStore>, SimulatedSensorHandle) {
    setup_with_store(sensor, memory_store().await)
}

pub fn setup_with_store<S: RecordStore>(
    sensor: SimulatedSensor,
    store: S,
) -> (AccessController<S>, SimulatedSensorHandle) {
    let (transport, handle) = MockTransport::new();
    let sensor = sensor.spawn(handle);
    let engine = ProtocolEngine::with_transport(transport, test_config());
    (AccessController::new(engine, store), sensor)
}

/// Controller over a bare mock transport the test answers by hand.
pub async fn setup_scripted() -> (AccessController<SqliteRecordStore>, MockTransportHandle) {
    let (transport, handle) = MockTransport::new();
    let engine = ProtocolEngine::with_transport(transport, test_config());
    (AccessController::new(engine, memory_store().await), handle)
}

/// Record store wrapper that fails selected operations with `ConnectionLost`.
pub struct FailingStore {
    inner: SqliteRecordStore,
    pub fail_reads: AtomicBool,
    pub fail_inserts: AtomicBool,
    pub fail_logs: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl FailingStore {
    pub async fn new() -> Self {
        Self {
            inner: memory_store().await,
            fail_reads: AtomicBool::new(false),
            fail_inserts: AtomicBool::new(false),
            fail_logs: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &SqliteRecordStore {
        &self.inner
    }

    fn check(flag: &AtomicBool) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::ConnectionLost("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for FailingStore {
    async fn insert_identity(&self, identity: &EnrolledIdentity) -> StoreResult<()> {
        Self::check(&self.fail_inserts)?;
        self.inner.insert_identity(identity).await
    }

    async fn update_last_access(&self, id: i64, timestamp: DateTime<Utc>) -> StoreResult<()> {
        Self::check(&self.fail_inserts)?;
        self.inner.update_last_access(id, timestamp).await
    }

    async fn delete_identity(&self, id: i64) -> StoreResult<u64> {
        Self::check(&self.fail_deletes)?;
        self.inner.delete_identity(id).await
    }

    async fn append_access_log(
        &self,
        fingerprint_id: i64,
        timestamp: DateTime<Utc>,
        confidence: i32,
        status: AccessStatus,
    ) -> StoreResult<i64> {
        Self::check(&self.fail_logs)?;
        self.inner
            .append_access_log(fingerprint_id, timestamp, confidence, status)
            .await
    }

    async fn find_identity_name(&self, id: i64) -> StoreResult<Option<String>> {
        Self::check(&self.fail_reads)?;
        self.inner.find_identity_name(id).await
    }

    async fn find_identity(&self, id: i64) -> StoreResult<Option<EnrolledIdentity>> {
        Self::check(&self.fail_reads)?;
        self.inner.find_identity(id).await
    }

    async fn list_identities(&self) -> StoreResult<Vec<EnrolledIdentity>> {
        Self::check(&self.fail_reads)?;
        self.inner.list_identities().await
    }

    async fn list_recent_logs(&self, limit: i64) -> StoreResult<Vec<AccessLogEntry>> {
        Self::check(&self.fail_reads)?;
        self.inner.list_recent_logs(limit).await
    }

    // record_access and record_deletion use the trait's step-by-step defaults.
}
