//! Link to a directly attached measurement device.
//!
//! Alternative transport for the same ingestion role as the relay:
//! whatever owns the physical link (serial port, USB bulk endpoint)
//! pushes raw inbound buffers here, and a periodic `process_incoming`
//! drains them, decodes each one, and publishes the resulting frames to
//! the registry. Everything runs synchronously on the caller's thread —
//! this component spawns no workers of its own.

pub mod codec;
pub mod protocol;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;

use bytes::Bytes;
use tracing::trace;

use crate::data::{
    DataFrame, DataPayload, DataPoint, GpioSample, NumericSample, SerialSample,
};
use crate::registry::DataRegistry;
use protocol::DeviceMessage;

/// Source id under which GPIO snapshots are published.
const GPIO_SOURCE_ID: &str = "teensy.gpio";
const GPIO_SOURCE_NAME: &str = "Teensy GPIO";

struct LinkInner {
    port_name: String,
    connected: bool,
    incoming: VecDeque<Bytes>,
    outgoing: VecDeque<Bytes>,
}

/// Queue-based device link with a plain connected/disconnected flag.
///
/// Disconnecting drains the pending queues, so nothing stale is
/// processed or transmitted after a reconnect.
pub struct DeviceLink {
    inner: Mutex<LinkInner>,
}

impl Default for DeviceLink {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceLink {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LinkInner {
                port_name: String::new(),
                connected: false,
                incoming: VecDeque::new(),
                outgoing: VecDeque::new(),
            }),
        }
    }

    // ── Connection state ─────────────────────────────────────────

    pub fn set_port_name(&self, port: impl Into<String>) {
        let mut inner = self.inner.lock().expect("device link lock poisoned");
        inner.port_name = port.into();
    }

    pub fn port_name(&self) -> String {
        let inner = self.inner.lock().expect("device link lock poisoned");
        inner.port_name.clone()
    }

    pub fn connect(&self) {
        let mut inner = self.inner.lock().expect("device link lock poisoned");
        inner.connected = true;
    }

    /// Drop the connection flag and discard everything queued in both
    /// directions.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock().expect("device link lock poisoned");
        inner.connected = false;
        inner.incoming.clear();
        inner.outgoing.clear();
    }

    pub fn is_connected(&self) -> bool {
        let inner = self.inner.lock().expect("device link lock poisoned");
        inner.connected
    }

    // ── Outbound ─────────────────────────────────────────────────

    /// Encode a message onto the outgoing queue.
    pub fn send(&self, message: &DeviceMessage) {
        let encoded = Bytes::from(protocol::encode(message));
        let mut inner = self.inner.lock().expect("device link lock poisoned");
        inner.outgoing.push_back(encoded);
    }

    /// Hand the encoded outbound buffers to the owner of the physical
    /// link, in send order.
    pub fn drain_outgoing(&self) -> Vec<Bytes> {
        let mut inner = self.inner.lock().expect("device link lock poisoned");
        inner.outgoing.drain(..).collect()
    }

    // ── Inbound ──────────────────────────────────────────────────

    /// Queue one raw buffer received from the device.
    pub fn push_incoming(&self, bytes: Bytes) {
        let mut inner = self.inner.lock().expect("device link lock poisoned");
        inner.incoming.push_back(bytes);
    }

    /// Drain the inbound queue, decoding each buffer and publishing the
    /// resulting frames to `registry` in push order.
    pub fn process_incoming(&self, registry: &DataRegistry) {
        loop {
            let buffer = {
                let mut inner = self.inner.lock().expect("device link lock poisoned");
                match inner.incoming.pop_front() {
                    Some(buffer) => buffer,
                    None => break,
                }
            };

            if let Some(message) = protocol::decode(&buffer) {
                self.handle_message(&message, registry);
            }
        }
    }

    fn handle_message(&self, message: &DeviceMessage, registry: &DataRegistry) {
        let now = SystemTime::now();
        match message {
            DeviceMessage::MeasurementUpdate(update) => {
                let points = update
                    .channels
                    .iter()
                    .map(|channel| DataPoint {
                        channel_id: channel.channel_id.clone(),
                        payload: DataPayload::Numeric(NumericSample {
                            value: channel.value,
                            unit: channel.unit.clone(),
                            timestamp: now,
                        }),
                    })
                    .collect();
                registry.update(DataFrame {
                    source_id: update.source_id.clone(),
                    source_name: update.source_id.clone(),
                    points,
                    timestamp: now,
                });
            }
            DeviceMessage::GpioStateResponse(state) => {
                registry.update(DataFrame {
                    source_id: GPIO_SOURCE_ID.to_string(),
                    source_name: GPIO_SOURCE_NAME.to_string(),
                    points: vec![DataPoint {
                        channel_id: "gpio".to_string(),
                        payload: DataPayload::Gpio(GpioSample {
                            pins: state.pins.clone(),
                            timestamp: now,
                        }),
                    }],
                    timestamp: now,
                });
            }
            DeviceMessage::SerialData(payload) => {
                registry.update(DataFrame {
                    source_id: payload.source_id.clone(),
                    source_name: payload.source_id.clone(),
                    points: vec![DataPoint {
                        channel_id: "serial".to_string(),
                        payload: DataPayload::Serial(SerialSample {
                            text: String::from_utf8_lossy(&payload.bytes).into_owned(),
                            timestamp: now,
                        }),
                    }],
                    timestamp: now,
                });
            }
            // Handshake, GPIO commands, heartbeats, and acks have no
            // registry-visible effect.
            other => trace!(tag = other.tag(), "device message without registry effect"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    fn label(frame: &DataFrame) -> String {
        match frame.points.first().map(|p| &p.payload) {
            Some(DataPayload::Gpio(_)) => "gpio".to_string(),
            Some(DataPayload::Serial(_)) => "serial".to_string(),
            _ => "measurement".to_string(),
        }
    }

    #[test]
    fn connect_flag_lifecycle() {
        let link = DeviceLink::new();
        assert!(!link.is_connected());

        link.set_port_name("/dev/ttyACM0");
        link.connect();
        assert!(link.is_connected());
        assert_eq!(link.port_name(), "/dev/ttyACM0");

        link.disconnect();
        assert!(!link.is_connected());
    }

    #[test]
    fn frames_are_published_in_push_order() {
        let link = DeviceLink::new();
        let registry = DataRegistry::new();
        link.connect();

        let order: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        for source in ["teensy.gpio", ""] {
            let order = order.clone();
            registry.add_observer(source, move |frame| {
                order.lock().unwrap().push(label(frame));
            });
        }

        link.push_incoming(Bytes::from_static(&[0x22])); // GPIO state
        link.push_incoming(Bytes::from_static(&[0x12])); // serial data
        link.push_incoming(Bytes::from_static(&[0x10])); // measurement
        link.process_incoming(&registry);

        assert_eq!(*order.lock().unwrap(), vec!["gpio", "serial", "measurement"]);
    }

    #[test]
    fn gpio_state_lands_under_the_fixed_source_id() {
        let link = DeviceLink::new();
        let registry = DataRegistry::new();

        link.push_incoming(Bytes::from_static(&[0x22]));
        link.process_incoming(&registry);

        let frame = registry.latest("teensy.gpio").unwrap();
        assert_eq!(frame.source_name, "Teensy GPIO");
        assert_eq!(frame.points.len(), 1);
        assert_eq!(frame.points[0].channel_id, "gpio");
        assert!(matches!(frame.points[0].payload, DataPayload::Gpio(_)));
    }

    #[test]
    fn disconnect_discards_queued_buffers() {
        let link = DeviceLink::new();
        let registry = DataRegistry::new();
        link.connect();

        link.push_incoming(Bytes::from_static(&[0x22]));
        link.push_incoming(Bytes::from_static(&[0x12]));
        link.push_incoming(Bytes::from_static(&[0x10]));
        link.disconnect();
        link.process_incoming(&registry);

        assert!(registry.latest("teensy.gpio").is_none());
        assert!(registry.latest("").is_none());
    }

    #[test]
    fn non_telemetry_messages_do_not_touch_the_registry() {
        let link = DeviceLink::new();
        let registry = DataRegistry::new();

        for tag in [0x01u8, 0x02, 0x30, 0x31, 0x32, 0x7F] {
            link.push_incoming(Bytes::copy_from_slice(&[tag]));
        }
        link.process_incoming(&registry);

        assert!(registry.list_sources().is_empty());
        assert!(registry.latest("teensy.gpio").is_none());
        assert!(registry.latest("").is_none());
    }

    #[test]
    fn send_queues_encoded_bytes_until_drained() {
        let link = DeviceLink::new();
        link.send(&DeviceMessage::QueryGpioState);
        link.send(&DeviceMessage::Ack);

        let drained = link.drain_outgoing();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].as_ref(), &[0x21]);
        assert_eq!(drained[1].as_ref(), &[0x31]);
        assert!(link.drain_outgoing().is_empty());

        link.send(&DeviceMessage::Ack);
        link.disconnect();
        assert!(link.drain_outgoing().is_empty());
    }
}
