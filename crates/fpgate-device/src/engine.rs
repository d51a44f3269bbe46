//! Command/response protocol engine.
//!
//! The engine owns a background read loop over a [`Transport`] and exposes
//! [`ProtocolEngine::send_command`], which writes one command and waits for
//! its correlated response and the sensor's trailing ready line.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────────────────┐
//! send_command ──►│ in_flight lock ─► ready gate ─► write    │
//!                 │        ▲                         │       │
//!                 │        │ oneshot (pending slot)  ▼       │
//!                 │  read loop ◄── codec ◄── Transport bytes │
//!                 └────────┬─────────────────────────────────┘
//!                          ▼
//!                  broadcast<DeviceEvent> ──► presentation layer
//! ```
//!
//! # Correlation
//!
//! The protocol carries no request id. The first non-ready response seen
//! after a write is handed to the single pending waiter. Ready lines are
//! never correlated; they only raise the readiness flag. Any response that
//! arrives while nobody is waiting is logged and published as
//! [`DeviceEvent::Unsolicited`].
//!
//! # Phases
//!
//! One call moves through `Idle → AwaitingResponse → AwaitingReady → Idle`.
//! The whole call, including the wait for readiness before the write, shares
//! one deadline. Missing it returns [`ProtocolError::Timeout`] and drops back
//! to `Idle`. Nothing is retried.

use bytes::BytesMut;
use fpgate_core::{ConnectError, ProtocolError};
use fpgate_protocol::{Command, DiscardReason, Event, ParseOutcome, Response, SensorLineCodec};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::{Decoder, Encoder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{EngineConfig, SerialConfig};
use crate::transport::{SerialTransport, Transport};

/// Where the current `send_command` call is in its exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandPhase {
    #[default]
    Idle,
    AwaitingResponse,
    AwaitingReady,
}

/// Diagnostic notification for the presentation layer.
///
/// Delivered through a broadcast channel; slow subscribers lose the oldest
/// events, never block the read loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Free-text line from the firmware.
    Info(String),

    /// Readiness flipped.
    Readiness(bool),

    /// A response arrived while no command was waiting.
    Unsolicited(Response),

    /// A malformed line was dropped.
    Discarded(DiscardReason),

    /// The transport failed; the engine is now closed.
    TransportLost(String),
}

type SharedTransport = Arc<Mutex<Option<Box<dyn Transport>>>>;

/// State shared between callers and the read loop.
struct Shared {
    pending: Mutex<Option<oneshot::Sender<Response>>>,
    ready: watch::Sender<bool>,
    phase: watch::Sender<CommandPhase>,
    events: broadcast::Sender<DeviceEvent>,
    cancel: CancellationToken,
}

impl Shared {
    fn publish(&self, event: DeviceEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn set_ready(&self, ready: bool) {
        let previous = self.ready.send_replace(ready);
        if previous != ready {
            debug!(ready, "Readiness changed");
            self.publish(DeviceEvent::Readiness(ready));
        }
    }

    fn set_phase(&self, phase: CommandPhase) {
        self.phase.send_replace(phase);
    }

    async fn dispatch(&self, outcome: ParseOutcome) {
        match outcome {
            ParseOutcome::Discard(reason) => {
                warn!(%reason, "Discarded malformed line");
                self.publish(DeviceEvent::Discarded(reason));
            }
            ParseOutcome::Event(Event::InfoMessage { text }) => {
                info!(message = %text, "Sensor");
                self.publish(DeviceEvent::Info(text));
            }
            ParseOutcome::Event(Event::Response(response)) => {
                trace!(line = %response.to_line(), "Response line");

                if response.kind.is_ready() {
                    self.set_ready(true);
                    return;
                }
                self.set_ready(false);

                let waiter = self.pending.lock().await.take();
                let unclaimed = match waiter {
                    Some(tx) => tx.send(response).err(),
                    None => Some(response),
                };

                if let Some(response) = unclaimed {
                    warn!(
                        kind = %response.kind,
                        id = response.subject_id,
                        message = %response.message,
                        "Unsolicited response discarded"
                    );
                    self.publish(DeviceEvent::Unsolicited(response));
                }
            }
        }
    }
}

/// Handle to an open sensor link.
///
/// At most one command is in flight at a time: concurrent callers of
/// [`send_command`](Self::send_command) queue on an internal lock and are
/// served in turn.
///
/// # Examples
///
/// ```
/// use fpgate_device::mock::{MockTransport, SimulatedSensor};
/// use fpgate_device::{EngineConfig, ProtocolEngine};
/// use fpgate_protocol::{Command, ResponseKind};
///
/// #[tokio::main]
/// async fn main() {
///     let (transport, handle) = MockTransport::new();
///     let _sensor = SimulatedSensor::new().with_template(4).spawn(handle);
///     let engine = ProtocolEngine::with_transport(transport, EngineConfig::default());
///
///     let response = engine.send_command(Command::Count).await.unwrap();
///     assert_eq!(response.kind, ResponseKind::Report);
///     assert_eq!(response.subject_id, 1);
///
///     engine.close().await;
/// }
/// ```
pub struct ProtocolEngine {
    shared: Arc<Shared>,
    transport: SharedTransport,
    in_flight: Mutex<()>,
    reader: Mutex<Option<JoinHandle<()>>>,
    config: EngineConfig,
    name: String,
}

impl ProtocolEngine {
    /// Open the serial port and start the read loop.
    ///
    /// Returns once the port is open; it does not wait for a ready line.
    pub async fn open(serial: &SerialConfig, config: EngineConfig) -> Result<Self, ConnectError> {
        let transport = SerialTransport::open(serial).await?;
        Ok(Self::with_transport(transport, config))
    }

    /// Start an engine over an already open transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_transport<T: Transport + 'static>(transport: T, config: EngineConfig) -> Self {
        let name = transport.name().to_string();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let shared = Arc::new(Shared {
            pending: Mutex::new(None),
            ready: watch::Sender::new(config.assume_ready),
            phase: watch::Sender::new(CommandPhase::Idle),
            events,
            cancel: CancellationToken::new(),
        });
        let transport: SharedTransport = Arc::new(Mutex::new(Some(Box::new(transport))));

        let reader = tokio::spawn(read_loop(
            Arc::clone(&shared),
            Arc::clone(&transport),
            config.clone(),
        ));

        info!(transport = %name, "Protocol engine started");

        Self {
            shared,
            transport,
            in_flight: Mutex::new(()),
            reader: Mutex::new(Some(reader)),
            config,
            name,
        }
    }

    /// Send a command using the configured timeout.
    pub async fn send_command(&self, command: Command) -> Result<Response, ProtocolError> {
        self.send_command_timeout(command, self.config.command_timeout)
            .await
    }

    /// Send a command and wait for its response and the following ready line.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Timeout`] if readiness, the response or the trailing
    ///   ready line does not arrive within `timeout`
    /// - [`ProtocolError::TransportFailure`] if the write fails
    /// - [`ProtocolError::Closed`] if the engine is or becomes closed
    pub async fn send_command_timeout(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<Response, ProtocolError> {
        let _turn = self.in_flight.lock().await;

        if self.shared.cancel.is_cancelled() {
            return Err(ProtocolError::Closed);
        }

        let deadline = Instant::now() + timeout;
        let timeout_ms = timeout.as_millis() as u64;

        if let Err(e) = self.wait_ready(deadline, timeout_ms).await {
            warn!(command = %command, error = %e, "Sensor never became ready");
            return Err(e);
        }

        let (tx, rx) = oneshot::channel();
        *self.shared.pending.lock().await = Some(tx);
        self.shared.set_ready(false);

        if let Err(e) = self.write(command).await {
            self.shared.pending.lock().await.take();
            self.shared.set_ready(true);
            error!(command = %command, error = %e, "Failed to write command");
            return Err(e);
        }

        info!(command = %command, op = command.name(), "Command sent");
        self.shared.set_phase(CommandPhase::AwaitingResponse);

        let outcome = tokio::select! {
            _ = self.shared.cancel.cancelled() => Err(ProtocolError::Closed),
            result = tokio::time::timeout_at(deadline, rx) => match result {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(_)) => Err(ProtocolError::Closed),
                Err(_) => Err(ProtocolError::timeout(timeout_ms)),
            },
        };

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                self.shared.pending.lock().await.take();
                self.shared.set_phase(CommandPhase::Idle);
                warn!(command = %command, error = %e, "No response to command");
                return Err(e);
            }
        };

        debug!(
            command = %command,
            kind = %response.kind,
            id = response.subject_id,
            "Response correlated"
        );
        self.shared.set_phase(CommandPhase::AwaitingReady);

        let ready = self.wait_ready(deadline, timeout_ms).await;
        self.shared.set_phase(CommandPhase::Idle);

        if let Err(e) = ready {
            warn!(
                command = %command,
                line = %response.to_line(),
                error = %e,
                "No ready line after response, dropping response"
            );
            return Err(e);
        }

        Ok(response)
    }

    async fn write(&self, command: Command) -> Result<(), ProtocolError> {
        let mut wire = BytesMut::new();
        SensorLineCodec::new()
            .encode(command, &mut wire)
            .map_err(|e| ProtocolError::transport(e.to_string()))?;

        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(ProtocolError::Closed)?;
        trace!(bytes = ?&wire[..], "Writing to transport");
        transport
            .write_all(&wire)
            .map_err(|e| ProtocolError::transport(e.to_string()))
    }

    async fn wait_ready(&self, deadline: Instant, timeout_ms: u64) -> Result<(), ProtocolError> {
        let mut rx = self.shared.ready.subscribe();
        let became_ready = async { rx.wait_for(|ready| *ready).await.map(|_| ()) };

        tokio::select! {
            _ = self.shared.cancel.cancelled() => Err(ProtocolError::Closed),
            result = tokio::time::timeout_at(deadline, became_ready) => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(ProtocolError::Closed),
                Err(_) => Err(ProtocolError::timeout(timeout_ms)),
            },
        }
    }

    /// Stop the read loop and release the transport.
    ///
    /// Any in-flight command resolves with [`ProtocolError::Closed`]. Safe to
    /// call more than once.
    pub async fn close(&self) {
        if !self.shared.cancel.is_cancelled() {
            info!(transport = %self.name, "Closing protocol engine");
        }
        self.shared.cancel.cancel();

        if let Some(reader) = self.reader.lock().await.take()
            && let Err(e) = reader.await
        {
            error!(error = %e, "Read loop terminated abnormally");
        }

        self.shared.pending.lock().await.take();
        self.transport.lock().await.take();
        self.shared.set_phase(CommandPhase::Idle);
    }

    /// Subscribe to diagnostic events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.shared.events.subscribe()
    }

    /// Whether the sensor last reported it will accept a command.
    pub fn is_ready(&self) -> bool {
        *self.shared.ready.borrow()
    }

    /// `false` once closed, explicitly or by a transport failure.
    pub fn is_open(&self) -> bool {
        !self.shared.cancel.is_cancelled()
    }

    pub fn phase(&self) -> CommandPhase {
        *self.shared.phase.borrow()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for ProtocolEngine {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl std::fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .field("ready", &self.is_ready())
            .field("phase", &self.phase())
            .finish()
    }
}

async fn read_loop(shared: Arc<Shared>, transport: SharedTransport, config: EngineConfig) {
    let mut codec = SensorLineCodec::with_max_line_length(config.max_line_length);
    let mut buffer = BytesMut::with_capacity(config.read_chunk_size);
    let mut scratch = vec![0u8; config.read_chunk_size.max(1)];

    while !shared.cancel.is_cancelled() {
        let read = {
            let mut guard = transport.lock().await;
            match guard.as_mut() {
                Some(transport) => transport.read_available(&mut scratch),
                None => break,
            }
        };

        match read {
            Ok(0) => {
                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
            Ok(n) => {
                trace!(bytes = n, "Read from transport");
                buffer.extend_from_slice(&scratch[..n]);
                loop {
                    match codec.decode(&mut buffer) {
                        Ok(Some(outcome)) => shared.dispatch(outcome).await,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "Line decoder failed, dropping buffer");
                            buffer.clear();
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Transport read failed, closing engine");
                shared.publish(DeviceEvent::TransportLost(e.to_string()));
                shared.cancel.cancel();
                shared.pending.lock().await.take();
                break;
            }
        }
    }

    debug!("Read loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn fast_config() -> EngineConfig {
        EngineConfig::default()
            .with_poll_interval(Duration::from_millis(5))
            .with_command_timeout(Duration::from_millis(300))
    }

    #[tokio::test]
    async fn test_send_command_correlates_response() {
        let (transport, handle) = MockTransport::new();
        let engine = ProtocolEngine::with_transport(transport, fast_config());

        let responder = tokio::spawn(async move {
            assert_eq!(handle.next_written().await.as_deref(), Some("C"));
            handle.feed_line("C - Get Template Count");
            handle.feed_line("R,R,3,0,Template count");
            handle.feed_line("R,Y,0,0,Ready for next command");
            handle
        });

        let response = engine.send_command(Command::Count).await.unwrap();
        assert_eq!(response.subject_id, 3);
        assert!(engine.is_ready());
        assert_eq!(engine.phase(), CommandPhase::Idle);

        responder.await.unwrap();
        engine.close().await;
    }

    #[tokio::test]
    async fn test_timeout_without_response() {
        let (transport, _handle) = MockTransport::new();
        let engine = ProtocolEngine::with_transport(transport, fast_config());

        let err = engine.send_command(Command::Verify).await.unwrap_err();
        assert_eq!(err, ProtocolError::timeout(300));
        assert_eq!(engine.phase(), CommandPhase::Idle);
        assert!(engine.shared.pending.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_immediate() {
        let (transport, handle) = MockTransport::new();
        handle.set_write_failure(true);
        let engine = ProtocolEngine::with_transport(
            transport,
            fast_config().with_command_timeout(Duration::from_secs(30)),
        );

        let started = Instant::now();
        let err = engine.send_command(Command::Count).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TransportFailure { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(engine.is_ready(), "readiness restored after failed write");
    }

    #[tokio::test]
    async fn test_ready_lines_update_readiness() {
        let (transport, handle) = MockTransport::new();
        let engine =
            ProtocolEngine::with_transport(transport, fast_config().with_assume_ready(false));
        let mut events = engine.subscribe();
        assert!(!engine.is_ready());

        handle.feed_line("R,Y,0,0,Fingerprint system ready");

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, DeviceEvent::Readiness(true));
        assert!(engine.is_ready());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (transport, _handle) = MockTransport::new();
        let engine = ProtocolEngine::with_transport(transport, fast_config());

        engine.close().await;
        engine.close().await;
        assert!(!engine.is_open());
        assert_eq!(
            engine.send_command(Command::Count).await,
            Err(ProtocolError::Closed)
        );
    }
}
