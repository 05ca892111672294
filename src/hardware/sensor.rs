//! Capability traits implemented by hardware adapters.
//!
//! The navigation core only ever talks to these traits; radio, ultrasonic and
//! UI adapters implement them and can be swapped without touching core logic.

use crate::core::{BeaconReading, GridCoord, RangeSample};
use crate::hardware::SensorResult;

/// Source of signal-strength samples, one batch per scan cycle
pub trait BeaconScanner {
    /// Run one scan cycle and return every beacon heard during it.
    /// Returns an empty batch when nothing was heard.
    fn scan(&mut self) -> SensorResult<Vec<BeaconReading>>;
}

/// Source of range returns for map learning
pub trait RangeSensor {
    /// Sweep the configured angles from the given cell
    fn sweep(&mut self, origin: GridCoord, angles_deg: &[f64]) -> SensorResult<Vec<RangeSample>>;
}

/// Receives a notification whenever the occupancy grid changes
pub trait GridObserver {
    /// `revision` is the grid's obstacle revision after the change
    fn grid_changed(&mut self, revision: u64);
}

impl<F> GridObserver for F
where
    F: FnMut(u64),
{
    fn grid_changed(&mut self, revision: u64) {
        self(revision)
    }
}
