// Telemetry data domain models and their wire format
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryReading {
    pub timestamp: DateTime<Utc>,
    pub battery_chemistry: String,
    pub milliamp_hours: f64,
    pub voltage: f64,
    pub temperature: f64,
    pub usb_alert: bool,
}

/// A decoded message from the telemetry stream
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Reset,
    Reading(TelemetryReading),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported message type '{0}'")]
    UnsupportedType(String),

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(f64),
}

#[derive(Debug, Deserialize)]
struct WireReading {
    timestamp: f64,
    #[serde(default)]
    battery_chemistry: String,
    milliamp_hours: f64,
    voltage: f64,
    temperature: f64,
    #[serde(default)]
    usb_alert: bool,
}

impl InboundMessage {
    /// Decode one text frame. Objects tagged `"type": "reset"` are reset
    /// directives; untagged objects are telemetry readings.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;

        if let Some(kind) = value.get("type") {
            return match kind.as_str() {
                Some("reset") => Ok(InboundMessage::Reset),
                Some(other) => Err(DecodeError::UnsupportedType(other.to_string())),
                None => Err(DecodeError::UnsupportedType(kind.to_string())),
            };
        }

        let wire: WireReading = serde_json::from_value(value)?;
        let timestamp = timestamp_from_secs(wire.timestamp)
            .ok_or(DecodeError::InvalidTimestamp(wire.timestamp))?;

        Ok(InboundMessage::Reading(TelemetryReading {
            timestamp,
            battery_chemistry: wire.battery_chemistry,
            milliamp_hours: wire.milliamp_hours,
            voltage: wire.voltage,
            temperature: wire.temperature,
            usb_alert: wire.usb_alert,
        }))
    }
}

/// Liveness ping sent periodically while connected
pub fn heartbeat_frame() -> String {
    serde_json::json!({ "type": "ping" }).to_string()
}

fn timestamp_from_secs(secs: f64) -> Option<DateTime<Utc>> {
    let millis = (secs * 1000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reading() {
        let text = r#"{"timestamp":1700000000.5,"milliamp_hours":120.5,"voltage":3.9,"temperature":24.0,"battery_chemistry":"lipo","usb_alert":true}"#;

        let InboundMessage::Reading(reading) = InboundMessage::decode(text).unwrap() else {
            panic!("expected a reading");
        };
        assert_eq!(reading.timestamp.timestamp_millis(), 1_700_000_000_500);
        assert_eq!(reading.battery_chemistry, "lipo");
        assert_eq!(reading.milliamp_hours, 120.5);
        assert_eq!(reading.voltage, 3.9);
        assert_eq!(reading.temperature, 24.0);
        assert!(reading.usb_alert);
    }

    #[test]
    fn test_decode_integer_timestamp_and_defaults() {
        let text = r#"{"timestamp":1700000000,"milliamp_hours":1,"voltage":4,"temperature":20}"#;

        let InboundMessage::Reading(reading) = InboundMessage::decode(text).unwrap() else {
            panic!("expected a reading");
        };
        assert_eq!(reading.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(reading.battery_chemistry, "");
        assert!(!reading.usb_alert);
    }

    #[test]
    fn test_decode_reset() {
        let message = InboundMessage::decode(r#"{"type":"reset"}"#).unwrap();
        assert_eq!(message, InboundMessage::Reset);
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(
            InboundMessage::decode("not json"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            InboundMessage::decode(r#"{"timestamp":1,"voltage":3.0}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            InboundMessage::decode(r#"{"type":"pong"}"#),
            Err(DecodeError::UnsupportedType(kind)) if kind == "pong"
        ));
        assert!(matches!(
            InboundMessage::decode(r#"{"type":7}"#),
            Err(DecodeError::UnsupportedType(_))
        ));
        assert!(matches!(
            InboundMessage::decode(
                r#"{"timestamp":1e300,"milliamp_hours":1,"voltage":4,"temperature":20}"#
            ),
            Err(DecodeError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_heartbeat_frame() {
        let value: Value = serde_json::from_str(&heartbeat_frame()).unwrap();
        assert_eq!(value["type"], "ping");
    }
}
