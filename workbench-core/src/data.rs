//! The telemetry data model shared by every transport and consumer.
//!
//! A [`DataFrame`] is one atomic, timestamped batch of channel readings
//! for a single source. Frames are immutable value objects: transports
//! build them, the registry stores the most recent one per source, and
//! observers receive clones. History retention is the subscriber's
//! problem, not the model's.

use std::fmt;
use std::time::{Duration, SystemTime};

// ── DataKind ─────────────────────────────────────────────────────

/// The shape of data a source produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataKind {
    Numeric,
    Waveform,
    Serial,
    Logic,
    GpioState,
    #[default]
    Custom,
}

impl DataKind {
    /// Parse a protocol tag, case-insensitively.
    ///
    /// Unrecognized tags map to [`DataKind::Custom`] — the relay may
    /// advertise kinds this build does not know about yet.
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "numeric" => DataKind::Numeric,
            "waveform" => DataKind::Waveform,
            "serial" => DataKind::Serial,
            "logic" => DataKind::Logic,
            "gpiostate" | "gpio" => DataKind::GpioState,
            _ => DataKind::Custom,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Numeric => write!(f, "numeric"),
            DataKind::Waveform => write!(f, "waveform"),
            DataKind::Serial => write!(f, "serial"),
            DataKind::Logic => write!(f, "logic"),
            DataKind::GpioState => write!(f, "gpiostate"),
            DataKind::Custom => write!(f, "custom"),
        }
    }
}

// ── Samples ──────────────────────────────────────────────────────

/// A single scalar reading.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSample {
    pub value: f64,
    pub unit: String,
    pub timestamp: SystemTime,
}

/// A buffer of equally spaced samples.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformSample {
    pub samples: Vec<f64>,
    pub sample_rate_hz: f64,
    pub timestamp: SystemTime,
}

/// A chunk of textual output from a serial stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSample {
    pub text: String,
    pub timestamp: SystemTime,
}

/// One captured slice of digital channels.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicSample {
    pub channels: Vec<bool>,
    pub sample_period: Duration,
    pub timestamp: SystemTime,
}

/// The level of every GPIO pin at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct GpioSample {
    pub pins: Vec<bool>,
    pub timestamp: SystemTime,
}

// ── DataPayload ──────────────────────────────────────────────────

/// The payload of one [`DataPoint`] — exactly one variant is active.
///
/// Consumers match exhaustively; `Empty` is the explicit "this point
/// carried nothing we understood" tag, never a silent fallthrough.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DataPayload {
    #[default]
    Empty,
    Numeric(NumericSample),
    Waveform(WaveformSample),
    Serial(SerialSample),
    Logic(LogicSample),
    Gpio(GpioSample),
}

// ── DataPoint / DataFrame ────────────────────────────────────────

/// One channel's reading within a frame.
///
/// `channel_id` is unique within its frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub channel_id: String,
    pub payload: DataPayload,
}

/// An atomic update for one source at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub source_id: String,
    pub source_name: String,
    pub points: Vec<DataPoint>,
    pub timestamp: SystemTime,
}

// ── SourceMetadata ───────────────────────────────────────────────

/// Identity and shape of a telemetry source.
///
/// Immutable after registration; re-registering the same `id`
/// overwrites the whole record.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMetadata {
    /// Unique, stable key.
    pub id: String,
    /// Display name.
    pub name: String,
    pub kind: DataKind,
    pub description: String,
    pub unit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_tag_is_case_insensitive() {
        assert_eq!(DataKind::from_tag("Numeric"), DataKind::Numeric);
        assert_eq!(DataKind::from_tag("WAVEFORM"), DataKind::Waveform);
        assert_eq!(DataKind::from_tag("serial"), DataKind::Serial);
        assert_eq!(DataKind::from_tag("logic"), DataKind::Logic);
    }

    #[test]
    fn kind_accepts_both_gpio_tags() {
        assert_eq!(DataKind::from_tag("gpio"), DataKind::GpioState);
        assert_eq!(DataKind::from_tag("GpioState"), DataKind::GpioState);
    }

    #[test]
    fn unknown_kind_falls_back_to_custom() {
        assert_eq!(DataKind::from_tag("thermal-camera"), DataKind::Custom);
        assert_eq!(DataKind::from_tag(""), DataKind::Custom);
    }

    #[test]
    fn kind_display_roundtrips_through_from_tag() {
        for kind in [
            DataKind::Numeric,
            DataKind::Waveform,
            DataKind::Serial,
            DataKind::Logic,
            DataKind::GpioState,
            DataKind::Custom,
        ] {
            assert_eq!(DataKind::from_tag(&kind.to_string()), kind);
        }
    }

    #[test]
    fn payload_defaults_to_empty() {
        assert_eq!(DataPayload::default(), DataPayload::Empty);
    }
}
