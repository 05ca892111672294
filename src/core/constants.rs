//! Physical constants and system parameters

/// Smallest distance (world units) a beacon reading may resolve to
pub const MIN_BEACON_DISTANCE: f64 = 0.1;

/// Largest distance (world units) a beacon reading may resolve to
pub const MAX_BEACON_DISTANCE: f64 = 20.0;

/// Sentinel reported for a reading outside the plausible signal window
pub const INVALID_DISTANCE: f64 = -1.0;

/// Minimum number of valid beacons required for trilateration
pub const MIN_TRILATERATION_BEACONS: usize = 3;
