//! Log-distance path-loss model for converting RSSI into range

use crate::core::{MAX_BEACON_DISTANCE, MIN_BEACON_DISTANCE};
use crate::validation::{SampleValidator, SignalWindow};
use log::trace;
use serde::{Deserialize, Serialize};

/// Log-distance path-loss model
///
/// `distance = 10^((reference_rssi - rssi) / (10 * path_loss_exponent))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathLossModel {
    /// Expected RSSI one world unit from the beacon (dBm)
    pub reference_rssi: f64,
    /// Environment-dependent attenuation exponent (2.0 in free space)
    pub path_loss_exponent: f64,
    /// Plausible RSSI window; readings outside it are invalid
    #[serde(flatten)]
    pub window: SignalWindow,
}

impl Default for PathLossModel {
    fn default() -> Self {
        Self {
            reference_rssi: -59.0,
            path_loss_exponent: 2.0,
            window: SignalWindow::default(),
        }
    }
}

impl PathLossModel {
    pub fn new(reference_rssi: f64, path_loss_exponent: f64) -> Self {
        Self {
            reference_rssi,
            path_loss_exponent,
            ..Default::default()
        }
    }

    pub fn with_window(mut self, noise_floor_rssi: f64, near_field_rssi: f64) -> Self {
        self.window = SignalWindow {
            noise_floor_rssi,
            near_field_rssi,
        };
        self
    }

    pub fn validator(&self) -> SampleValidator {
        SampleValidator::new(self.window)
    }

    /// Convert an RSSI reading into a range clamped to the plausible distance band.
    /// Returns `None` for readings outside the signal window.
    pub fn rssi_to_distance(&self, rssi: f64) -> Option<f64> {
        if let Err(reason) = self.validator().validate_rssi(rssi) {
            trace!("[PathLossModel] rejecting reading: {}", reason);
            return None;
        }

        let exponent = (self.reference_rssi - rssi) / (10.0 * self.path_loss_exponent);
        let distance = 10f64.powf(exponent);
        if !distance.is_finite() {
            return None;
        }

        Some(distance.clamp(MIN_BEACON_DISTANCE, MAX_BEACON_DISTANCE))
    }

    /// Expected RSSI at a given distance (inverse of the model, unclamped)
    pub fn rssi_at(&self, distance: f64) -> f64 {
        let distance = distance.max(f64::MIN_POSITIVE);
        self.reference_rssi - 10.0 * self.path_loss_exponent * distance.log10()
    }
}
