//! Byte transports the protocol engine runs over.
//!
//! The engine never blocks on a read: it asks the transport for whatever is
//! already buffered and sleeps for the poll interval when nothing is. This
//! keeps [`Transport`] synchronous and object safe, so the engine can hold a
//! `Box<dyn Transport>` whether it talks to a real port or a mock.

use fpgate_core::ConnectError;
use serde::Serialize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{self, Read, Write};
use tracing::{debug, info};

use crate::config::SerialConfig;

/// A bidirectional byte stream to the sensor.
pub trait Transport: Send {
    /// Copy already-received bytes into `buf` without blocking.
    ///
    /// Returns `Ok(0)` when nothing is pending. An error means the link is
    /// gone and the engine will close.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the whole buffer and flush it.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Human readable endpoint name for logs.
    fn name(&self) -> &str;
}

/// Serial port transport backed by the `serialport` crate.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open the port with 8N1 framing and wait out the settle delay.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::PortOpen`] if the driver refuses the port.
    pub async fn open(config: &SerialConfig) -> Result<Self, ConnectError> {
        if config.port.trim().is_empty() {
            return Err(ConnectError::Config("serial port path is empty".to_string()));
        }

        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| ConnectError::PortOpen {
                port: config.port.clone(),
                reason: e.to_string(),
            })?;

        info!(port = %config.port, baud = config.baud_rate, "Serial port opened");

        if !config.settle_delay.is_zero() {
            debug!(delay_ms = config.settle_delay.as_millis() as u64, "Waiting for board to settle");
            tokio::time::sleep(config.settle_delay).await;
        }

        Ok(Self {
            port,
            name: config.port.clone(),
        })
    }
}

impl Transport for SerialTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pending = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if pending == 0 || buf.is_empty() {
            return Ok(0);
        }

        let len = pending.min(buf.len());
        match self.port.read(&mut buf[..len]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A serial port visible on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub port_name: String,
    pub kind: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// List the serial ports the driver can see.
pub fn available_ports() -> Result<Vec<PortInfo>, ConnectError> {
    let ports = serialport::available_ports()
        .map_err(|e| ConnectError::Config(format!("cannot enumerate serial ports: {e}")))?;

    Ok(ports
        .into_iter()
        .map(|port| match port.port_type {
            SerialPortType::UsbPort(usb) => PortInfo {
                port_name: port.port_name,
                kind: "usb".to_string(),
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            other => PortInfo {
                port_name: port.port_name,
                kind: match other {
                    SerialPortType::PciPort => "pci",
                    SerialPortType::BluetoothPort => "bluetooth",
                    _ => "unknown",
                }
                .to_string(),
                vid: None,
                pid: None,
                manufacturer: None,
                product: None,
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_rejects_empty_path() {
        let config = SerialConfig::new("  ");
        let result = SerialTransport::open(&config).await;
        assert!(matches!(result, Err(ConnectError::Config(_))));
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let config = SerialConfig::new("/dev/fpgate-does-not-exist")
            .with_settle_delay(std::time::Duration::ZERO);
        match SerialTransport::open(&config).await {
            Err(ConnectError::PortOpen { port, .. }) => {
                assert_eq!(port, "/dev/fpgate-does-not-exist");
            }
            Err(other) => panic!("Expected PortOpen, got {other:?}"),
            Ok(_) => panic!("Expected PortOpen, got an open port"),
        }
    }

    #[test]
    fn test_port_info_serializes() {
        let info = PortInfo {
            port_name: "/dev/ttyACM0".to_string(),
            kind: "usb".to_string(),
            vid: Some(0x2341),
            pid: Some(0x0043),
            manufacturer: Some("Arduino".to_string()),
            product: None,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"port_name\":\"/dev/ttyACM0\""));
        assert!(json.contains("\"vid\":9025"));
    }
}
