//! Temperature-to-tier derivation for automatic fan control.
//!
//! Maps a temperature reading onto one of four discrete fan tiers using a
//! lower-bound-inclusive step function over three configurable thresholds.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Step table mapping temperature to a fan tier (0..=3).
///
/// `thresholds` must be strictly increasing. A temperature below the first
/// threshold derives tier 0; at or above the last, tier 3. The comparison is
/// lower-bound inclusive: a reading exactly on a threshold selects the
/// higher tier.
///
/// # Example
///
/// ```
/// use smartfand::fan_tiers::TierTable;
///
/// let table = TierTable::default(); // 24 / 26 / 28 °C
/// assert_eq!(table.derive(23.9), 0);
/// assert_eq!(table.derive(24.0), 1);
/// assert_eq!(table.derive(27.4), 2);
/// assert_eq!(table.derive(31.0), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    thresholds: [f64; 3],
}

impl TierTable {
    /// Creates a table from three strictly increasing thresholds.
    pub fn new(thresholds: [f64; 3]) -> Result<Self> {
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(ControlError::validation(format!(
                "tier thresholds must be finite, got {thresholds:?}"
            )));
        }
        if !(thresholds[0] < thresholds[1] && thresholds[1] < thresholds[2]) {
            return Err(ControlError::validation(format!(
                "tier thresholds must be strictly increasing, got {thresholds:?}"
            )));
        }
        Ok(Self { thresholds })
    }

    /// Derives the fan tier for a temperature reading.
    ///
    /// Pure and total over finite inputs; callers reject NaN before this
    /// point. Readings outside the sensor's nominal range saturate at
    /// tier 0 and tier 3.
    pub fn derive(&self, temperature_c: f64) -> u8 {
        self.thresholds
            .iter()
            .take_while(|&&t| temperature_c >= t)
            .count() as u8
    }

    pub fn thresholds(&self) -> [f64; 3] {
        self.thresholds
    }
}

impl Default for TierTable {
    /// The canonical table: tiers step up at 24, 26 and 28 °C.
    fn default() -> Self {
        Self {
            thresholds: [24.0, 26.0, 28.0],
        }
    }
}
