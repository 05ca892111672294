//! Navigation configuration: JSON load/save and parameter validation

use crate::algorithms::localization::LocalizerConfig;
use crate::algorithms::rssi::PathLossModel;
use crate::core::MIN_TRILATERATION_BEACONS;
use crate::mapping::{ExplorerConfig, LearnerConfig};
use crate::planning::PlannerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Occupancy grid dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Width in cells
    pub width: usize,
    /// Height in cells
    pub height: usize,
    /// World units per cell edge
    pub cell_size: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            cell_size: 0.5,
        }
    }
}

/// Fixed beacon position in world units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    pub id: u16,
    pub x: f64,
    pub y: f64,
}

/// Complete navigation-core configuration, stored as JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub grid: GridConfig,
    pub path_loss: PathLossModel,
    pub localizer: LocalizerConfig,
    pub beacons: Vec<BeaconConfig>,
    pub explorer: ExplorerConfig,
    pub learner: LearnerConfig,
    pub planner: PlannerConfig,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value {value} for {parameter}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    #[error("beacon id {id} is configured more than once")]
    DuplicateBeacon { id: u16 },
}

impl ConfigError {
    fn invalid(parameter: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of checking a configuration
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigError>,
    /// Usable but suspicious settings
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl NavConfig {
    /// Load and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// First error found, if any
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.check().errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Collect every error and warning
    pub fn check(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let errors = &mut result.errors;

        if self.grid.width == 0 {
            errors.push(ConfigError::invalid("grid.width", self.grid.width, "must be at least 1"));
        }
        if self.grid.height == 0 {
            errors.push(ConfigError::invalid("grid.height", self.grid.height, "must be at least 1"));
        }
        if !(self.grid.cell_size.is_finite() && self.grid.cell_size > 0.0) {
            errors.push(ConfigError::invalid("grid.cell_size", self.grid.cell_size, "must be positive"));
        }

        let path_loss = &self.path_loss;
        if !(path_loss.path_loss_exponent.is_finite() && path_loss.path_loss_exponent > 0.0) {
            errors.push(ConfigError::invalid(
                "path_loss.path_loss_exponent",
                path_loss.path_loss_exponent,
                "must be positive",
            ));
        }
        if !path_loss.reference_rssi.is_finite() {
            errors.push(ConfigError::invalid("path_loss.reference_rssi", path_loss.reference_rssi, "must be finite"));
        }
        if !(path_loss.window.noise_floor_rssi < path_loss.window.near_field_rssi) {
            errors.push(ConfigError::invalid(
                "path_loss.noise_floor_rssi",
                path_loss.window.noise_floor_rssi,
                "must be below near_field_rssi",
            ));
        }

        let localizer = &self.localizer;
        for (parameter, value) in [
            ("localizer.outlier_threshold", localizer.outlier_threshold),
            ("localizer.residual_cutoff", localizer.residual_cutoff),
            ("localizer.determinant_epsilon", localizer.determinant_epsilon),
            ("localizer.weight_epsilon", localizer.weight_epsilon),
        ] {
            if !(value.is_finite() && value > 0.0) {
                errors.push(ConfigError::invalid(parameter, value, "must be positive"));
            }
        }
        if localizer.outlier_min_beacons < MIN_TRILATERATION_BEACONS + 1 {
            errors.push(ConfigError::invalid(
                "localizer.outlier_min_beacons",
                localizer.outlier_min_beacons,
                "must leave at least three beacons after rejection",
            ));
        }
        if !(0.0..=1.0).contains(&localizer.centroid_confidence) {
            errors.push(ConfigError::invalid(
                "localizer.centroid_confidence",
                localizer.centroid_confidence,
                "must be within [0, 1]",
            ));
        }
        if let Some(workspace) = &localizer.workspace {
            if !(workspace.min_x <= workspace.max_x && workspace.min_y <= workspace.max_y) {
                errors.push(ConfigError::invalid(
                    "localizer.workspace",
                    format!("{:?}", workspace),
                    "minimum corner must not exceed maximum corner",
                ));
            }
        }

        let mut seen = HashSet::new();
        for beacon in &self.beacons {
            if !seen.insert(beacon.id) {
                errors.push(ConfigError::DuplicateBeacon { id: beacon.id });
            }
            if !(beacon.x.is_finite() && beacon.y.is_finite()) {
                errors.push(ConfigError::invalid(
                    "beacons",
                    format!("{} at ({}, {})", beacon.id, beacon.x, beacon.y),
                    "position must be finite",
                ));
            }
        }
        if self.beacons.len() < MIN_TRILATERATION_BEACONS {
            result.warnings.push(format!(
                "only {} beacons configured, localization needs {}",
                self.beacons.len(),
                MIN_TRILATERATION_BEACONS
            ));
        }

        let errors = &mut result.errors;
        if !(self.learner.obstacle_threshold.is_finite() && self.learner.obstacle_threshold > 0.0) {
            errors.push(ConfigError::invalid(
                "learner.obstacle_threshold",
                self.learner.obstacle_threshold,
                "must be positive",
            ));
        }
        if self.learner.scan_stride == 0 {
            errors.push(ConfigError::invalid("learner.scan_stride", 0, "must be at least 1"));
        }
        if self.learner.angles_deg.is_empty() {
            errors.push(ConfigError::invalid("learner.angles_deg", "[]", "at least one angle is required"));
        }

        if !(self.planner.tie_epsilon.is_finite() && self.planner.tie_epsilon >= 0.0) {
            errors.push(ConfigError::invalid(
                "planner.tie_epsilon",
                self.planner.tie_epsilon,
                "must be non-negative",
            ));
        }
        if self.planner.cache_capacity == 0 {
            errors.push(ConfigError::invalid("planner.cache_capacity", 0, "must be at least 1"));
        }
        if self.planner.allow_unknown {
            result
                .warnings
                .push("planner.allow_unknown routes through unmapped cells".to_string());
        }

        result
    }
}
