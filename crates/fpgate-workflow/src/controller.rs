use crate::error::{Operation, WorkflowError, WorkflowResult};
use chrono::Utc;
use fpgate_core::constants::{COUNT_UNAVAILABLE, UNKNOWN_FINGERPRINT_ID, UNKNOWN_NAME};
use fpgate_core::{DeviceError, Error, FingerprintId};
use fpgate_device::ProtocolEngine;
use fpgate_protocol::{Command, ResponseKind};
use fpgate_storage::{
    AccessLogEntry, AccessStatus, EnrolledIdentity, RecordStore, StoreError, StoreResult,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// A granted verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedAccess {
    /// Slot the sensor matched.
    pub id: i64,
    /// Stored name, or `"Unknown"` if the slot has no identity row.
    pub name: String,
    pub confidence: i32,
    pub log_id: i64,
    /// Whether the store held an identity for the slot.
    pub known: bool,
}

impl VerifiedAccess {
    pub fn is_known(&self) -> bool {
        self.known
    }
}

/// A delete the sensor confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub id: FingerprintId,
    /// Identity rows removed; 0 when the slot was not in the store.
    pub rows_affected: u64,
}

impl DeleteOutcome {
    pub fn removed_from_store(&self) -> bool {
        self.rows_affected > 0
    }
}

/// Runs enroll, verify, delete and count against the sensor and the record
/// store.
///
/// Every mutating operation is a sensor step followed by a store step, and
/// the store step only runs after the sensor reported success. A store
/// failure at that point is returned as [`WorkflowError::Store`] and is not
/// rolled back on the sensor.
///
/// # Examples
///
/// ```no_run
/// use fpgate_device::{EngineConfig, ProtocolEngine, SerialConfig};
/// use fpgate_storage::{Database, DatabaseConfig, SqliteRecordStore};
/// use fpgate_workflow::AccessController;
/// use fpgate_core::FingerprintId;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = ProtocolEngine::open(&SerialConfig::new("/dev/ttyUSB0"), EngineConfig::default()).await?;
/// let store = SqliteRecordStore::new(Database::new(DatabaseConfig::new("fpgate.db")).await?);
/// let controller = AccessController::new(engine, store);
///
/// controller.enroll(FingerprintId::new(12)?, "Ana").await?;
/// let access = controller.verify().await?;
/// println!("Welcome {} ({}%)", access.name, access.confidence);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AccessController<S> {
    engine: ProtocolEngine,
    store: S,
}

impl<S: RecordStore> AccessController<S> {
    pub fn new(engine: ProtocolEngine, store: S) -> Self {
        Self { engine, store }
    }

    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Enroll a template into slot `id` and store it under `name`.
    ///
    /// The slot is checked against the store first so an existing template
    /// is never overwritten on the sensor.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::InvalidInput`] for a blank name
    /// - [`WorkflowError::Precheck`] if the slot is already stored or the
    ///   store cannot be read
    /// - [`WorkflowError::Protocol`] / [`WorkflowError::Device`] if the
    ///   sensor did not enroll
    /// - [`WorkflowError::Store`] if the sensor enrolled but the insert failed
    pub async fn enroll(&self, id: FingerprintId, name: &str) -> WorkflowResult<EnrolledIdentity> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName.into());
        }

        match self.store.find_identity_name(id.as_i64()).await {
            Ok(Some(existing)) => {
                warn!(id = %id, existing = %existing, "Slot already enrolled");
                return Err(WorkflowError::Precheck(StoreError::DuplicateId {
                    id: id.as_i64(),
                }));
            }
            Ok(None) => {}
            Err(e) => return Err(WorkflowError::Precheck(e)),
        }

        info!(id = %id, name = %name, "Enrolling fingerprint");
        let response = self.engine.send_command(Command::Enroll(id)).await?;
        if response.kind != ResponseKind::Success {
            warn!(id = %id, message = %response.message, "Sensor rejected enrollment");
            return Err(DeviceError::EnrollRejected {
                id: id.as_u8(),
                message: response.message,
            }
            .into());
        }

        let identity = EnrolledIdentity::new(id, name, Utc::now());
        if let Err(e) = self.store.insert_identity(&identity).await {
            error!(
                id = %id,
                error = %e,
                "Template enrolled on sensor but not stored; manual reconciliation needed"
            );
            return Err(WorkflowError::store(Operation::Enroll, e));
        }

        info!(id = %id, name = %name, "Fingerprint enrolled");
        Ok(identity)
    }

    /// Ask the sensor for a match and record the outcome.
    ///
    /// A match updates the identity's last access and appends an
    /// `ACCESS_GRANTED` entry. Anything else, timeouts included, appends an
    /// `ACCESS_DENIED` entry for slot 0; failure to write that entry is only
    /// logged.
    pub async fn verify(&self) -> WorkflowResult<VerifiedAccess> {
        info!("Verifying fingerprint");
        let response = match self.engine.send_command(Command::Verify).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Verify did not complete");
                self.record_denied().await;
                return Err(e.into());
            }
        };

        if response.kind != ResponseKind::Success {
            info!(message = %response.message, "Access denied");
            self.record_denied().await;
            return Err(DeviceError::VerifyRejected {
                message: response.message,
            }
            .into());
        }

        let id = i64::from(response.subject_id);
        let confidence = response.confidence;

        let stored_name = self
            .store
            .find_identity_name(id)
            .await
            .map_err(|e| self.store_failed(Operation::Verify, id, e))?;
        let known = stored_name.is_some();
        let name = stored_name.unwrap_or_else(|| UNKNOWN_NAME.to_string());

        let log_id = self
            .store
            .record_access(id, Utc::now(), confidence)
            .await
            .map_err(|e| self.store_failed(Operation::Verify, id, e))?;

        info!(id, name = %name, confidence, "Access granted");
        Ok(VerifiedAccess {
            id,
            name,
            confidence,
            log_id,
            known,
        })
    }

    /// Delete slot `id` on the sensor, then log the deletion and drop the
    /// identity row.
    ///
    /// A slot the store never knew about still counts as a successful
    /// delete; check [`DeleteOutcome::removed_from_store`].
    pub async fn delete(&self, id: FingerprintId) -> WorkflowResult<DeleteOutcome> {
        info!(id = %id, "Deleting fingerprint");
        let response = self.engine.send_command(Command::Delete(id)).await?;
        if response.kind != ResponseKind::Success {
            warn!(id = %id, message = %response.message, "Sensor rejected deletion");
            return Err(DeviceError::DeleteRejected {
                id: id.as_u8(),
                message: response.message,
            }
            .into());
        }

        let rows_affected = self
            .store
            .record_deletion(id.as_i64(), Utc::now())
            .await
            .map_err(|e| self.store_failed(Operation::Delete, id.as_i64(), e))?;

        if rows_affected == 0 {
            warn!(id = %id, "Deleted on sensor, no stored identity for this slot");
        } else {
            info!(id = %id, "Fingerprint deleted");
        }
        Ok(DeleteOutcome { id, rows_affected })
    }

    /// Number of templates on the sensor, or `-1` if it could not be read.
    ///
    /// Whatever response the sensor correlates with `C` carries the count in
    /// its subject field, regardless of kind.
    pub async fn count(&self) -> i32 {
        match self.engine.send_command(Command::Count).await {
            Ok(response) => {
                debug!(count = response.subject_id, kind = %response.kind, "Template count");
                response.subject_id
            }
            Err(e) => {
                warn!(error = %e, "Template count unavailable");
                COUNT_UNAVAILABLE
            }
        }
    }

    pub async fn list_identities(&self) -> StoreResult<Vec<EnrolledIdentity>> {
        self.store.list_identities().await
    }

    pub async fn recent_logs(&self, limit: i64) -> StoreResult<Vec<AccessLogEntry>> {
        self.store.list_recent_logs(limit).await
    }

    /// Close the engine. The store is left to its owner.
    pub async fn close(&self) {
        self.engine.close().await;
    }

    async fn record_denied(&self) {
        if let Err(e) = self
            .store
            .append_access_log(UNKNOWN_FINGERPRINT_ID, Utc::now(), 0, AccessStatus::AccessDenied)
            .await
        {
            error!(error = %e, "Failed to log denied access");
        }
    }

    fn store_failed(&self, operation: Operation, id: i64, e: StoreError) -> WorkflowError {
        error!(
            %operation,
            id,
            error = %e,
            "Sensor step succeeded but the store update failed; manual reconciliation needed"
        );
        WorkflowError::store(operation, e)
    }
}
