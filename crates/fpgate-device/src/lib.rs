//! Device layer for the fingerprint sensor.
//!
//! This crate turns a raw byte stream into a request/response API:
//!
//! - [`Transport`]: the byte stream itself, with [`SerialTransport`] for real
//!   hardware and [`mock::MockTransport`] for tests
//! - [`ProtocolEngine`]: background read loop, response correlation,
//!   readiness gating and timeouts
//! - [`mock::SimulatedSensor`]: firmware emulation that answers commands
//!   over a mock transport
//!
//! # Usage
//!
//! ```no_run
//! use fpgate_device::{EngineConfig, ProtocolEngine, SerialConfig};
//! use fpgate_protocol::Command;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let serial = SerialConfig::new("/dev/ttyUSB0");
//!     let engine = ProtocolEngine::open(&serial, EngineConfig::default()).await?;
//!
//!     let response = engine.send_command(Command::Count).await?;
//!     println!("{} templates stored", response.subject_id);
//!
//!     engine.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod mock;
pub mod transport;

pub use config::{EngineConfig, SerialConfig};
pub use engine::{CommandPhase, DeviceEvent, ProtocolEngine};
pub use transport::{PortInfo, SerialTransport, Transport, available_ports};
