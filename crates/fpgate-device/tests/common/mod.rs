//! Shared helpers for device integration tests.

#![allow(dead_code)]

use fpgate_device::mock::{MockTransport, MockTransportHandle};
use fpgate_device::{DeviceEvent, EngineConfig, ProtocolEngine};
use std::time::Duration;
use tokio::sync::broadcast;

pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

pub fn test_config() -> EngineConfig {
    EngineConfig::default()
        .with_poll_interval(Duration::from_millis(5))
        .with_command_timeout(TEST_TIMEOUT)
}

pub fn engine_with_mock() -> (ProtocolEngine, MockTransportHandle) {
    let (transport, handle) = MockTransport::new();
    (ProtocolEngine::with_transport(transport, test_config()), handle)
}

/// Wait for the first event matching `pred`, skipping others.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<DeviceEvent>,
    mut pred: F,
) -> DeviceEvent
where
    F: FnMut(&DeviceEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("Event channel closed"),
            }
        }
    })
    .await
    .expect("Timed out waiting for event")
}
