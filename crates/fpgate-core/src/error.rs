use thiserror::Error;

/// Failure to open the transport to the sensor.
///
/// Fatal to the session: nothing can be exchanged until a new engine is opened.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Failed to open {port}: {reason}")]
    PortOpen { port: String, reason: String },

    #[error("Invalid transport configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-command exchange failure.
///
/// Recoverable: the caller may retry the whole compound operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// No correlated response (or no trailing ready signal) within the window.
    #[error("Command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Writing the command to the transport failed.
    #[error("Transport failure: {reason}")]
    TransportFailure { reason: String },

    /// The engine was closed before the exchange completed.
    #[error("Engine closed")]
    Closed,
}

impl ProtocolError {
    /// Create a new timeout error.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create a new transport failure error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::TransportFailure {
            reason: reason.into(),
        }
    }
}

/// The sensor explicitly reported failure for a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Sensor rejected enrollment of id {id}: {message}")]
    EnrollRejected { id: u8, message: String },

    #[error("Sensor found no match: {message}")]
    VerifyRejected { message: String },

    #[error("Sensor rejected deletion of id {id}: {message}")]
    DeleteRejected { id: u8, message: String },
}

/// General error for input validation plus the device-facing taxonomy.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Fingerprint id must be 1-127, got {id}")]
    InvalidFingerprintId { id: i64 },

    #[error("Invalid fingerprint id: {text}")]
    InvalidFingerprintIdText { text: String },

    #[error("Identity name must not be empty")]
    EmptyName,

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
