//! Sensor data validation

pub mod data;

pub use data::{SampleValidator, SignalWindow, ValidationError};
