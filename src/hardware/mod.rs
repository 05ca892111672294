//! Hardware abstraction layer for the navigation core
//!
//! The core depends only on the capability traits in [`sensor`]; BLE radios,
//! ultrasonic rangers and map consumers are adapters behind them.

pub mod sensor;
pub mod mock;
pub mod error;

pub use sensor::{BeaconScanner, RangeSensor, GridObserver};
pub use mock::{MockBeaconScanner, MockRangeSensor, RecordingObserver};
pub use error::{SensorError, SensorResult, RecoveryStrategy};
