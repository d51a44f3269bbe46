//! Serial link and engine configuration.

use fpgate_core::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_MAX_LINE_LENGTH,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_SETTLE_DELAY_MS,
};
use std::time::Duration;

/// Settings for opening the serial port to the sensor.
///
/// # Examples
///
/// ```
/// use fpgate_device::SerialConfig;
/// use std::time::Duration;
///
/// let config = SerialConfig::new("/dev/ttyACM0")
///     .with_baud_rate(57_600)
///     .with_settle_delay(Duration::ZERO);
///
/// assert_eq!(config.port, "/dev/ttyACM0");
/// assert_eq!(config.baud_rate, 57_600);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port path (`/dev/ttyUSB0`, `COM3`).
    pub port: String,

    /// Line speed, 8N1 framing is fixed.
    pub baud_rate: u32,

    /// Timeout applied to individual driver reads.
    pub read_timeout: Duration,

    /// Pause after opening the port. Most boards reset when the port opens
    /// and print their boot banner during this window.
    pub settle_delay: Duration,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        }
    }
}

/// Behaviour of the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Window for one command: readiness gate, response and trailing ready.
    pub command_timeout: Duration,

    /// Idle sleep of the read loop when the transport has nothing buffered.
    pub poll_interval: Duration,

    /// Size of the scratch buffer used for each transport read.
    pub read_chunk_size: usize,

    /// Lines longer than this are discarded by the codec.
    pub max_line_length: usize,

    /// Readiness assumed before the first `Ready` line is seen.
    pub assume_ready: bool,

    /// Capacity of the diagnostic event broadcast channel.
    pub event_capacity: usize,
}

impl EngineConfig {
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn with_assume_ready(mut self, assume_ready: bool) -> Self {
        self.assume_ready = assume_ready;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            read_chunk_size: 256,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            assume_ready: true,
            event_capacity: 64,
        }
    }
}
