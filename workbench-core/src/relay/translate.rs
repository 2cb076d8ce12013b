//! Tolerant translation from relay JSON into the data model.
//!
//! The relay is a separate process with its own release cadence, so the
//! parsing here is deliberately forgiving: missing optional fields take
//! defaults, malformed values fall back rather than fail, and only a
//! structurally unusable message yields `None` (and is then dropped by
//! the caller without touching any state).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::data::{
    DataFrame, DataKind, DataPayload, DataPoint, GpioSample, LogicSample, NumericSample,
    SerialSample, SourceMetadata, WaveformSample,
};

/// Interpret a timestamp value as seconds since the Unix epoch.
///
/// Accepts a number or a numeric string; anything else (including a
/// negative or non-finite value) falls back to "now".
pub(crate) fn parse_timestamp(value: &Value) -> SystemTime {
    let seconds = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    seconds
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .and_then(|d| UNIX_EPOCH.checked_add(d))
        .unwrap_or_else(SystemTime::now)
}

/// Build a [`SourceMetadata`] from one JSON object.
///
/// Returns `None` when the object carries no usable `id`.
pub(crate) fn metadata_from_json(value: &Value) -> Option<SourceMetadata> {
    let id = value.get("id").and_then(Value::as_str).unwrap_or_default();
    if id.is_empty() {
        return None;
    }
    Some(SourceMetadata {
        id: id.to_string(),
        name: value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string(),
        kind: DataKind::from_tag(value.get("kind").and_then(Value::as_str).unwrap_or("custom")),
        description: value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        unit: value
            .get("unit")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Decode the frame block of a `workbench.dataFrame` notification.
///
/// The embedded `source` block only supplies fallbacks here; the caller
/// registers it separately. Returns `None` when there is no `frame`
/// block or no source id can be recovered from either place.
pub(crate) fn frame_from_json(params: &Value) -> Option<DataFrame> {
    let frame_json = params.get("frame")?;

    let source = params.get("source").and_then(metadata_from_json);

    let fallback_id = source.as_ref().map(|m| m.id.as_str()).unwrap_or_default();
    let source_id = frame_json
        .get("sourceId")
        .and_then(Value::as_str)
        .unwrap_or(fallback_id);
    if source_id.is_empty() {
        return None;
    }

    let fallback_name = source
        .as_ref()
        .map(|m| m.name.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(source_id);
    let source_name = frame_json
        .get("sourceName")
        .and_then(Value::as_str)
        .unwrap_or(fallback_name);

    let timestamp = parse_timestamp(frame_json.get("timestamp").unwrap_or(&Value::Null));

    let points = frame_json
        .get("points")
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .map(|p| point_from_json(p, timestamp))
                .collect()
        })
        .unwrap_or_default();

    Some(DataFrame {
        source_id: source_id.to_string(),
        source_name: source_name.to_string(),
        points,
        timestamp,
    })
}

fn point_from_json(value: &Value, timestamp: SystemTime) -> DataPoint {
    let channel_id = value
        .get("channelId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let payload = if let Some(numeric) = value.get("numeric") {
        DataPayload::Numeric(NumericSample {
            value: numeric.get("value").and_then(Value::as_f64).unwrap_or(0.0),
            unit: numeric
                .get("unit")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            timestamp,
        })
    } else if let Some(waveform) = value.get("waveform") {
        DataPayload::Waveform(WaveformSample {
            samples: f64_array(waveform.get("samples")),
            sample_rate_hz: waveform
                .get("sampleRate")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            timestamp,
        })
    } else if let Some(serial) = value.get("serial") {
        DataPayload::Serial(SerialSample {
            text: serial
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            timestamp,
        })
    } else if let Some(logic) = value.get("logic") {
        DataPayload::Logic(LogicSample {
            channels: bool_array(logic.get("channels")),
            sample_period: Duration::from_nanos(
                logic.get("periodNs").and_then(Value::as_u64).unwrap_or(0),
            ),
            timestamp,
        })
    } else if let Some(gpio) = value.get("gpio") {
        DataPayload::Gpio(GpioSample {
            pins: bool_array(gpio.get("pins")),
            timestamp,
        })
    } else {
        DataPayload::Empty
    };

    DataPoint {
        channel_id,
        payload,
    }
}

fn f64_array(value: Option<&Value>) -> Vec<f64> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

fn bool_array(value: Option<&Value>) -> Vec<bool> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_bool).collect())
        .unwrap_or_default()
}
