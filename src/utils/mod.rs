//! Configuration loading and validation

pub mod config;

pub use config::{BeaconConfig, ConfigError, GridConfig, NavConfig, ValidationResult};
