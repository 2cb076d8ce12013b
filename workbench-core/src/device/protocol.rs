//! Wire protocol for a directly attached measurement device.
//!
//! Every message on the link is `{type: 1 byte, payload}`. Only the
//! leading type tag is currently defined upstream; the per-type payload
//! byte layouts are still an open protocol-definition task, so
//! [`decode`] recovers the tag and leaves the payload fields at their
//! defaults, and [`encode`] emits the tag alone. The public contract is
//! stable for whichever layout lands later: `decode` fails only on an
//! empty buffer.

use std::fmt;

// ── DeviceMessageType ────────────────────────────────────────────

/// The leading type tag of every device message.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceMessageType {
    HandshakeRequest = 0x01,
    HandshakeResponse = 0x02,
    MeasurementUpdate = 0x10,
    LogicFrame = 0x11,
    SerialData = 0x12,
    SetGpio = 0x20,
    QueryGpioState = 0x21,
    GpioStateResponse = 0x22,
    Heartbeat = 0x30,
    Ack = 0x31,
    Nack = 0x32,
}

impl TryFrom<u8> for DeviceMessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(DeviceMessageType::HandshakeRequest),
            0x02 => Ok(DeviceMessageType::HandshakeResponse),
            0x10 => Ok(DeviceMessageType::MeasurementUpdate),
            0x11 => Ok(DeviceMessageType::LogicFrame),
            0x12 => Ok(DeviceMessageType::SerialData),
            0x20 => Ok(DeviceMessageType::SetGpio),
            0x21 => Ok(DeviceMessageType::QueryGpioState),
            0x22 => Ok(DeviceMessageType::GpioStateResponse),
            0x30 => Ok(DeviceMessageType::Heartbeat),
            0x31 => Ok(DeviceMessageType::Ack),
            0x32 => Ok(DeviceMessageType::Nack),
            other => Err(other),
        }
    }
}

impl fmt::Display for DeviceMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── Payloads ─────────────────────────────────────────────────────

/// Opening handshake sent by the device.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandshakeRequest {
    pub firmware_version: String,
    pub device_id: String,
}

/// Reply accepting or rejecting a handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeResponse {
    pub accepted: bool,
    pub reason: String,
    pub protocol_version: u8,
}

impl Default for HandshakeResponse {
    fn default() -> Self {
        Self {
            accepted: false,
            reason: String::new(),
            protocol_version: 1,
        }
    }
}

/// One channel's scalar reading inside a measurement update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumericChannelUpdate {
    pub channel_id: String,
    pub value: f64,
    pub unit: String,
}

/// A batch of scalar readings for one source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurementUpdate {
    pub source_id: String,
    pub channels: Vec<NumericChannelUpdate>,
}

/// Raw bytes captured from the device's serial passthrough.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SerialPayload {
    pub source_id: String,
    pub bytes: Vec<u8>,
}

/// A captured logic-analyzer frame, bits packed LSB-first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogicFramePayload {
    pub source_id: String,
    pub packed_bits: Vec<u8>,
    pub sample_rate_hz: u32,
}

/// Drive one GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpioCommand {
    pub pin: u8,
    pub level: bool,
}

/// The level of every pin, in pin order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GpioStateResponse {
    pub pins: Vec<bool>,
}

/// Keep-alive with a monotonic sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Heartbeat {
    pub sequence: u64,
}

// ── DeviceMessage ────────────────────────────────────────────────

/// A decoded device message — exactly one variant per wire type, plus
/// an explicit `Unknown` for tags this build does not recognize.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    HandshakeRequest(HandshakeRequest),
    HandshakeResponse(HandshakeResponse),
    MeasurementUpdate(MeasurementUpdate),
    LogicFrame(LogicFramePayload),
    SerialData(SerialPayload),
    SetGpio(GpioCommand),
    QueryGpioState,
    GpioStateResponse(GpioStateResponse),
    Heartbeat(Heartbeat),
    Ack,
    Nack,
    /// A tag outside the known set; carried so callers can log it.
    Unknown(u8),
}

impl DeviceMessage {
    /// The wire tag for this message.
    pub fn tag(&self) -> u8 {
        match self {
            DeviceMessage::HandshakeRequest(_) => DeviceMessageType::HandshakeRequest as u8,
            DeviceMessage::HandshakeResponse(_) => DeviceMessageType::HandshakeResponse as u8,
            DeviceMessage::MeasurementUpdate(_) => DeviceMessageType::MeasurementUpdate as u8,
            DeviceMessage::LogicFrame(_) => DeviceMessageType::LogicFrame as u8,
            DeviceMessage::SerialData(_) => DeviceMessageType::SerialData as u8,
            DeviceMessage::SetGpio(_) => DeviceMessageType::SetGpio as u8,
            DeviceMessage::QueryGpioState => DeviceMessageType::QueryGpioState as u8,
            DeviceMessage::GpioStateResponse(_) => DeviceMessageType::GpioStateResponse as u8,
            DeviceMessage::Heartbeat(_) => DeviceMessageType::Heartbeat as u8,
            DeviceMessage::Ack => DeviceMessageType::Ack as u8,
            DeviceMessage::Nack => DeviceMessageType::Nack as u8,
            DeviceMessage::Unknown(tag) => *tag,
        }
    }

    fn empty_for(message_type: DeviceMessageType) -> Self {
        match message_type {
            DeviceMessageType::HandshakeRequest => {
                DeviceMessage::HandshakeRequest(HandshakeRequest::default())
            }
            DeviceMessageType::HandshakeResponse => {
                DeviceMessage::HandshakeResponse(HandshakeResponse::default())
            }
            DeviceMessageType::MeasurementUpdate => {
                DeviceMessage::MeasurementUpdate(MeasurementUpdate::default())
            }
            DeviceMessageType::LogicFrame => {
                DeviceMessage::LogicFrame(LogicFramePayload::default())
            }
            DeviceMessageType::SerialData => DeviceMessage::SerialData(SerialPayload::default()),
            DeviceMessageType::SetGpio => DeviceMessage::SetGpio(GpioCommand::default()),
            DeviceMessageType::QueryGpioState => DeviceMessage::QueryGpioState,
            DeviceMessageType::GpioStateResponse => {
                DeviceMessage::GpioStateResponse(GpioStateResponse::default())
            }
            DeviceMessageType::Heartbeat => DeviceMessage::Heartbeat(Heartbeat::default()),
            DeviceMessageType::Ack => DeviceMessage::Ack,
            DeviceMessageType::Nack => DeviceMessage::Nack,
        }
    }
}

// ── Codec functions ──────────────────────────────────────────────

/// Serialize a message for the wire.
///
/// Currently the tag byte alone; payload serialization follows once the
/// per-type layouts are defined.
pub fn encode(message: &DeviceMessage) -> Vec<u8> {
    vec![message.tag()]
}

/// Parse one received buffer.
///
/// Fails (`None`) only on an empty buffer. Unrecognized tags decode to
/// [`DeviceMessage::Unknown`]; payload bytes beyond the tag are ignored
/// until the per-type layouts are defined.
pub fn decode(buffer: &[u8]) -> Option<DeviceMessage> {
    let tag = *buffer.first()?;
    Some(match DeviceMessageType::try_from(tag) {
        Ok(message_type) => DeviceMessage::empty_for(message_type),
        Err(unknown) => DeviceMessage::Unknown(unknown),
    })
}
