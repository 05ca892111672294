//! Plausibility checks for raw sensor readings.
//!
//! A rejected reading is never an error for the control loop: the caller
//! treats it as "no reading" for that beacon or angle this cycle.

use crate::core::{BeaconReading, RangeSample};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Reasons a single reading is discarded
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("non-finite value {value}")]
    NonFinite { value: f64 },
    #[error("RSSI {rssi} dBm at or below noise floor {floor} dBm")]
    BelowNoiseFloor { rssi: f64, floor: f64 },
    #[error("RSSI {rssi} dBm above near-field bound {bound} dBm")]
    AboveNearField { rssi: f64, bound: f64 },
    #[error("range {range} is not positive")]
    NonPositiveRange { range: f64 },
    #[error("duplicate reading for beacon {beacon_id}")]
    DuplicateBeacon { beacon_id: u16 },
}

/// Plausible signal-strength window for the beacon radios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWindow {
    /// Readings at or below this are indistinguishable from noise
    pub noise_floor_rssi: f64,
    /// Readings above this are near-field saturation
    pub near_field_rssi: f64,
}

impl Default for SignalWindow {
    fn default() -> Self {
        Self {
            noise_floor_rssi: -100.0,
            near_field_rssi: -20.0,
        }
    }
}

/// Validator for beacon and range readings
#[derive(Debug, Clone, Default)]
pub struct SampleValidator {
    window: SignalWindow,
}

impl SampleValidator {
    pub fn new(window: SignalWindow) -> Self {
        Self { window }
    }

    pub fn validate_rssi(&self, rssi: f64) -> Result<(), ValidationError> {
        if !rssi.is_finite() {
            return Err(ValidationError::NonFinite { value: rssi });
        }
        if rssi <= self.window.noise_floor_rssi {
            return Err(ValidationError::BelowNoiseFloor {
                rssi,
                floor: self.window.noise_floor_rssi,
            });
        }
        if rssi > self.window.near_field_rssi {
            return Err(ValidationError::AboveNearField {
                rssi,
                bound: self.window.near_field_rssi,
            });
        }
        Ok(())
    }

    /// A range is usable only if it is a positive, finite distance
    pub fn validate_range(&self, sample: &RangeSample) -> Result<(), ValidationError> {
        if !sample.range.is_finite() || !sample.angle_deg.is_finite() {
            return Err(ValidationError::NonFinite { value: sample.range });
        }
        if sample.range <= 0.0 {
            return Err(ValidationError::NonPositiveRange { range: sample.range });
        }
        Ok(())
    }

    /// Collapse a scan batch to one reading per beacon, keeping the strongest.
    /// A reading inside the signal window always wins over one outside it.
    /// Returns the deduplicated batch ordered by beacon id plus the dropped duplicates.
    pub fn deduplicate(&self, batch: &[BeaconReading]) -> (Vec<BeaconReading>, Vec<ValidationError>) {
        let mut strongest: BTreeMap<u16, BeaconReading> = BTreeMap::new();
        let mut warnings = Vec::new();

        for reading in batch {
            match strongest.get_mut(&reading.beacon_id) {
                Some(existing) => {
                    trace!("[SampleValidator] duplicate reading for beacon {}", reading.beacon_id);
                    warnings.push(ValidationError::DuplicateBeacon {
                        beacon_id: reading.beacon_id,
                    });
                    let replace = match (self.validate_rssi(reading.rssi).is_ok(), self.validate_rssi(existing.rssi).is_ok()) {
                        (true, false) => true,
                        (false, true) => false,
                        _ => reading.rssi > existing.rssi,
                    };
                    if replace {
                        *existing = *reading;
                    }
                }
                None => {
                    strongest.insert(reading.beacon_id, *reading);
                }
            }
        }

        (strongest.into_values().collect(), warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rssi_window() {
        let validator = SampleValidator::default();
        assert!(validator.validate_rssi(-59.0).is_ok());
        assert!(matches!(
            validator.validate_rssi(-100.0),
            Err(ValidationError::BelowNoiseFloor { .. })
        ));
        assert!(matches!(
            validator.validate_rssi(-5.0),
            Err(ValidationError::AboveNearField { .. })
        ));
        assert!(matches!(
            validator.validate_rssi(f64::NAN),
            Err(ValidationError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_range_validation() {
        let validator = SampleValidator::default();
        assert!(validator.validate_range(&RangeSample::new(90.0, 0.3)).is_ok());
        assert!(validator.validate_range(&RangeSample::new(90.0, 0.0)).is_err());
        assert!(validator.validate_range(&RangeSample::new(90.0, -1.0)).is_err());
        assert!(validator.validate_range(&RangeSample::new(90.0, f64::INFINITY)).is_err());
    }

    #[test]
    fn test_deduplicate_keeps_strongest() {
        let validator = SampleValidator::default();
        let batch = vec![
            BeaconReading::new(2, -80.0),
            BeaconReading::new(1, -60.0),
            BeaconReading::new(2, -65.0),
        ];
        let (readings, warnings) = validator.deduplicate(&batch);
        assert_eq!(readings, vec![BeaconReading::new(1, -60.0), BeaconReading::new(2, -65.0)]);
        assert_eq!(warnings, vec![ValidationError::DuplicateBeacon { beacon_id: 2 }]);
    }

    #[test]
    fn test_deduplicate_prefers_plausible_reading() {
        let validator = SampleValidator::default();
        let batch = vec![
            BeaconReading::new(1, f64::NAN),
            BeaconReading::new(1, -70.0),
            BeaconReading::new(2, -72.0),
            BeaconReading::new(2, -5.0),
            BeaconReading::new(3, -120.0),
            BeaconReading::new(3, -3.0),
        ];
        let (readings, warnings) = validator.deduplicate(&batch);
        assert_eq!(readings[0], BeaconReading::new(1, -70.0));
        assert_eq!(readings[1], BeaconReading::new(2, -72.0));
        // Neither is plausible, the stronger is kept and later rejected
        assert_eq!(readings[2], BeaconReading::new(3, -3.0));
        assert_eq!(warnings.len(), 3);
    }
}
