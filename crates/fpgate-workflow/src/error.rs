use fpgate_core::{DeviceError, ProtocolError};
use fpgate_storage::StoreError;
use std::fmt;
use thiserror::Error;

/// Compound operation that touches both the sensor and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Enroll,
    Verify,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Enroll => write!(f, "enroll"),
            Operation::Verify => write!(f, "verify"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Failure of a workflow operation.
///
/// The variants say how far the operation got:
///
/// - `InvalidInput` and `Precheck`: nothing was sent to the sensor
/// - `Protocol` and `Device`: the sensor step did not succeed, the store was
///   left alone (apart from the denied-access log entry on verify)
/// - `Store`: the sensor step succeeded and the store step failed, so the
///   two now disagree
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    InvalidInput(#[from] fpgate_core::Error),

    /// Store failure before the sensor was touched.
    #[error("Store check failed: {0}")]
    Precheck(StoreError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Store failure after the sensor confirmed the operation.
    #[error("Sensor completed {operation} but the store update failed: {source}")]
    Store {
        operation: Operation,
        #[source]
        source: StoreError,
    },
}

impl WorkflowError {
    pub(crate) fn store(operation: Operation, source: StoreError) -> Self {
        Self::Store { operation, source }
    }

    /// Whether the sensor and the store now disagree and need manual
    /// reconciliation.
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    /// The underlying store error, from either side of the sensor step.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Precheck(e) | Self::Store { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
