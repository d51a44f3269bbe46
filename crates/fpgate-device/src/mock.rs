//! In-memory transport and firmware simulation for testing without hardware.
//!
//! [`MockTransport`] is the engine side of a channel pair: whatever the
//! [`MockTransportHandle`] feeds shows up as readable bytes, and every
//! command the engine writes can be taken back out of the handle.
//!
//! [`SimulatedSensor`] sits on the handle side and answers commands the way
//! the sensor firmware does, including the diagnostic chatter and the
//! trailing ready line.

use fpgate_core::constants::{MAX_FINGERPRINT_ID, MIN_FINGERPRINT_ID};
use fpgate_protocol::{Response, ResponseKind};
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::transport::Transport;

#[derive(Debug)]
enum Inbound {
    Bytes(Vec<u8>),
    Disconnect,
}

/// Mock transport for testing and development.
///
/// # Examples
///
/// ```
/// use fpgate_device::mock::MockTransport;
/// use fpgate_device::Transport;
///
/// let (mut transport, handle) = MockTransport::new();
/// handle.feed_line("R,Y,0,0,Ready for next command");
///
/// let mut buf = [0u8; 64];
/// let n = transport.read_available(&mut buf).unwrap();
/// assert_eq!(&buf[..n], b"R,Y,0,0,Ready for next command\r\n");
/// ```
#[derive(Debug)]
pub struct MockTransport {
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    remainder: Vec<u8>,
    written_tx: mpsc::UnboundedSender<Vec<u8>>,
    fail_writes: Arc<AtomicBool>,
    name: String,
}

impl MockTransport {
    /// Create a new mock transport and the handle that drives it.
    pub fn new() -> (Self, MockTransportHandle) {
        Self::with_name("mock")
    }

    pub fn with_name(name: impl Into<String>) -> (Self, MockTransportHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (written_tx, written_rx) = mpsc::unbounded_channel();
        let fail_writes = Arc::new(AtomicBool::new(false));

        let transport = Self {
            inbound_rx,
            remainder: Vec::new(),
            written_tx,
            fail_writes: Arc::clone(&fail_writes),
            name: name.into(),
        };

        let handle = MockTransportHandle {
            inbound_tx,
            written_rx: Arc::new(Mutex::new(written_rx)),
            fail_writes,
        };

        (transport, handle)
    }
}

impl Transport for MockTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remainder.is_empty() {
            match self.inbound_rx.try_recv() {
                Ok(Inbound::Bytes(bytes)) => self.remainder = bytes,
                Ok(Inbound::Disconnect) => {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "mock transport disconnected",
                    ));
                }
                // A dropped handle leaves an idle line, not a broken one.
                Err(_) => return Ok(0),
            }
        }

        let n = self.remainder.len().min(buf.len());
        buf[..n].copy_from_slice(&self.remainder[..n]);
        self.remainder.drain(..n);
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock write failure",
            ));
        }
        let _ = self.written_tx.send(bytes.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handle for controlling a mock transport.
///
/// Cheap to clone; all clones drive the same transport.
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    written_rx: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockTransportHandle {
    /// Make raw bytes available to the next read.
    pub fn feed(&self, bytes: impl AsRef<[u8]>) {
        let _ = self.inbound_tx.send(Inbound::Bytes(bytes.as_ref().to_vec()));
    }

    /// Feed one line with the firmware's `\r\n` terminator.
    pub fn feed_line(&self, line: &str) {
        self.feed(format!("{line}\r\n"));
    }

    /// Wait for the next command the engine writes.
    ///
    /// Returns `None` once the transport has been dropped.
    pub async fn next_written(&self) -> Option<String> {
        let mut rx = self.written_rx.lock().await;
        rx.recv()
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Take a written command if one is already queued.
    pub async fn try_next_written(&self) -> Option<String> {
        let mut rx = self.written_rx.lock().await;
        rx.try_recv()
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Make every following write fail (or succeed again).
    pub fn set_write_failure(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the transport report a broken link on its next read.
    pub fn disconnect(&self) {
        let _ = self.inbound_tx.send(Inbound::Disconnect);
    }
}

/// What the simulated sensor sees when asked to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyBehavior {
    /// Match the lowest enrolled slot, or fail when the library is empty.
    FirstEnrolled,
    /// Match a fixed slot regardless of the library.
    Match { id: i32, confidence: i32 },
    /// Search finds nothing.
    NoMatch,
}

/// How much of its usual output the simulated sensor produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Diagnostics, result line, then ready.
    Normal,
    /// Diagnostics and result line, but never the trailing ready.
    WithoutReady,
    /// Nothing at all, as if the finger never arrived.
    Silent,
}

/// Firmware emulation for the sensor's command loop.
///
/// # Examples
///
/// ```
/// use fpgate_device::mock::SimulatedSensor;
///
/// let mut sensor = SimulatedSensor::new().with_template(3);
/// let lines = sensor.execute("C");
/// assert_eq!(lines.last().map(String::as_str), Some("R,R,1,0,Template count"));
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    templates: BTreeSet<i32>,
    verify: VerifyBehavior,
    enroll_rejection: Option<String>,
    mode: ResponseMode,
    ready_delay: Duration,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self {
            templates: BTreeSet::new(),
            verify: VerifyBehavior::FirstEnrolled,
            enroll_rejection: None,
            mode: ResponseMode::Normal,
            ready_delay: Duration::ZERO,
        }
    }

    pub fn with_template(mut self, id: i32) -> Self {
        self.templates.insert(id);
        self
    }

    pub fn with_verify(mut self, verify: VerifyBehavior) -> Self {
        self.verify = verify;
        self
    }

    /// Fail every enrollment with the given firmware message.
    pub fn with_enroll_rejection(mut self, message: impl Into<String>) -> Self {
        self.enroll_rejection = Some(message.into());
        self
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Hold back the trailing ready line for this long after each result.
    pub fn with_ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    /// Slots currently holding a template.
    pub fn templates(&self) -> Vec<i32> {
        self.templates.iter().copied().collect()
    }

    /// Lines printed at power-up.
    pub fn boot_lines() -> Vec<String> {
        vec![
            "Fingerprint sensor detected!".to_string(),
            Response::new(ResponseKind::Ready, 0, 0, "Fingerprint system ready").to_line(),
            "========== FINGERPRINT SYSTEM MENU ==========".to_string(),
            "C - Get Template Count".to_string(),
        ]
    }

    /// Run one wire command and return the lines printed before the ready line.
    pub fn execute(&mut self, wire: &str) -> Vec<String> {
        let mut chars = wire.trim().chars();
        let Some(opcode) = chars.next() else {
            return Vec::new();
        };
        let id = parse_slot(chars.as_str());

        match opcode {
            'E' => self.enroll(id),
            'V' => self.verify(),
            'D' => self.delete(id),
            'C' => vec![
                Response::new(
                    ResponseKind::Report,
                    self.templates.len() as i32,
                    0,
                    "Template count",
                )
                .to_line(),
            ],
            _ => vec![failure(0, "Unknown command")],
        }
    }

    fn enroll(&mut self, id: i32) -> Vec<String> {
        if !slot_in_range(id) {
            return vec![failure(0, "Invalid ID. Must be between 1-127")];
        }

        let mut lines = vec![
            format!("Enrolling ID #{id}"),
            "Place your finger on the sensor...".to_string(),
            "Image taken".to_string(),
            "Remove finger".to_string(),
            "Place same finger again...".to_string(),
            "Image taken".to_string(),
            "Creating model...".to_string(),
        ];

        if let Some(message) = &self.enroll_rejection {
            lines.push(failure(id, message));
            return lines;
        }

        lines.push("Storing model...".to_string());
        self.templates.insert(id);
        lines.push(
            Response::new(
                ResponseKind::Success,
                id,
                0,
                "Fingerprint enrolled successfully",
            )
            .to_line(),
        );
        lines
    }

    fn verify(&mut self) -> Vec<String> {
        let mut lines = vec!["Place finger to verify...".to_string()];

        let matched = match self.verify {
            VerifyBehavior::FirstEnrolled => self.templates.first().map(|&id| (id, 100)),
            VerifyBehavior::Match { id, confidence } => Some((id, confidence)),
            VerifyBehavior::NoMatch => None,
        };

        match matched {
            Some((id, confidence)) => {
                lines.push(format!("Found ID #{id} with confidence {confidence}"));
                lines.push(
                    Response::new(ResponseKind::Success, id, confidence, "Fingerprint matched")
                        .to_line(),
                );
            }
            None => {
                lines.push("No match found".to_string());
                lines.push(failure(0, "No match found"));
            }
        }
        lines
    }

    fn delete(&mut self, id: i32) -> Vec<String> {
        if !slot_in_range(id) {
            return vec![failure(0, "Invalid ID. Must be between 1-127")];
        }
        // The module acknowledges deleting an empty slot.
        self.templates.remove(&id);
        vec![
            Response::new(
                ResponseKind::Success,
                id,
                0,
                format!("Deleted fingerprint ID #{id}"),
            )
            .to_line(),
        ]
    }

    /// Run the sensor against a mock transport until the transport is dropped.
    pub fn spawn(self, transport: MockTransportHandle) -> SimulatedSensorHandle {
        let state = Arc::new(Mutex::new(self));
        let task_state = Arc::clone(&state);

        let task = tokio::spawn(async move {
            while let Some(wire) = transport.next_written().await {
                let (lines, mode, ready_delay) = {
                    let mut sensor = task_state.lock().await;
                    let lines = sensor.execute(&wire);
                    (lines, sensor.mode, sensor.ready_delay)
                };
                debug!(command = %wire, lines = lines.len(), "Simulated sensor executed command");

                if mode == ResponseMode::Silent {
                    continue;
                }
                for line in &lines {
                    transport.feed_line(line);
                }
                if mode == ResponseMode::WithoutReady {
                    continue;
                }
                if !ready_delay.is_zero() {
                    tokio::time::sleep(ready_delay).await;
                }
                transport.feed_line(
                    &Response::new(ResponseKind::Ready, 0, 0, "Ready for next command").to_line(),
                );
            }
        });

        SimulatedSensorHandle { state, task }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running [`SimulatedSensor`].
#[derive(Debug)]
pub struct SimulatedSensorHandle {
    state: Arc<Mutex<SimulatedSensor>>,
    task: JoinHandle<()>,
}

impl SimulatedSensorHandle {
    pub async fn templates(&self) -> Vec<i32> {
        self.state.lock().await.templates()
    }

    pub async fn set_verify(&self, verify: VerifyBehavior) {
        self.state.lock().await.verify = verify;
    }

    pub async fn set_mode(&self, mode: ResponseMode) {
        self.state.lock().await.mode = mode;
    }

    pub async fn set_enroll_rejection(&self, message: Option<String>) {
        self.state.lock().await.enroll_rejection = message;
    }
}

impl Drop for SimulatedSensorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn failure(id: i32, message: &str) -> String {
    Response::new(ResponseKind::Failure, id, 0, message).to_line()
}

/// Leading decimal digits, or -1 when there are none.
fn parse_slot(rest: &str) -> i32 {
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(-1)
}

fn slot_in_range(id: i32) -> bool {
    (i32::from(MIN_FINGERPRINT_ID)..=i32::from(MAX_FINGERPRINT_ID)).contains(&id)
}
