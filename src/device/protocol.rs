//! Wire payloads for the device controller's HTTP interface.
//!
//! The device reports raw sensor values that may arrive as JSON numbers or
//! numeric strings; both are accepted and parsed as floating point.

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::{
    error::{ControlError, Result},
    telemetry::Telemetry,
};

/// Outbound control command, serialized as the `POST control` body.
///
/// `Auto` serializes to `{"command":"auto"}`; `Manual` carries the speed:
/// `{"command":"manual","speed":42}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum DeviceCommand {
    Auto,
    Manual { speed: u8 },
}

/// Raw `GET get_data` response body.
#[derive(Debug, Deserialize)]
pub struct RawReading {
    #[serde(deserialize_with = "numeric_or_string")]
    pub temperature: f64,
    #[serde(deserialize_with = "numeric_or_string")]
    pub humidity: f64,
}

/// Parses a `get_data` response body into a validated [`Telemetry`] reading.
pub fn parse_reading(body: &str) -> Result<Telemetry> {
    let raw: RawReading = serde_json::from_str(body).map_err(ControlError::parse)?;

    if !raw.temperature.is_finite() {
        return Err(ControlError::parse(format!(
            "temperature is not a finite number: {}",
            raw.temperature
        )));
    }
    if !raw.humidity.is_finite() {
        return Err(ControlError::parse(format!(
            "humidity is not a finite number: {}",
            raw.humidity
        )));
    }

    Ok(Telemetry::new(raw.temperature, raw.humidity))
}

fn numeric_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom(format!("value {n} not representable as f64"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("value {s:?} is not numeric"))),
        other => Err(de::Error::custom(format!(
            "expected number or numeric string, got {other}"
        ))),
    }
}
