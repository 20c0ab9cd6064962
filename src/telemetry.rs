//! Telemetry reading type shared by the poller, store and event bus.

use chrono::{DateTime, Utc};

/// A timestamped temperature/humidity reading from the device.
///
/// Replaced wholesale on each successful poll; readings are never merged
/// field-by-field.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    /// Room temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Relative humidity, clamped to 0–100 %.
    pub humidity_pct: f64,
    /// When the reading was received by this client.
    pub observed_at: DateTime<Utc>,
}

impl Telemetry {
    pub fn new(temperature_c: f64, humidity_pct: f64) -> Self {
        Self {
            temperature_c,
            humidity_pct: humidity_pct.clamp(0.0, 100.0),
            observed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn humidity_is_clamped_to_percent_range() {
        assert_eq!(Telemetry::new(22.0, 103.5).humidity_pct, 100.0);
        assert_eq!(Telemetry::new(22.0, -1.0).humidity_pct, 0.0);
        assert_eq!(Telemetry::new(22.0, 55.0).humidity_pct, 55.0);
    }

    #[test]
    fn temperature_is_taken_as_is() {
        let reading = Telemetry::new(-12.5, 40.0);
        assert_eq!(reading.temperature_c, -12.5);
    }
}
