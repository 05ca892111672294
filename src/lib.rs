//! Navigation core for a small autonomous ground robot
//!
//! Turns beacon RSSI readings into a position estimate, maintains a 2D
//! occupancy grid through wall-following exploration and sweep-based
//! learning, and plans turn-minimizing routes across the committed map.

pub mod core;
pub mod algorithms;
pub mod mapping;
pub mod planning;
pub mod validation;
pub mod utils;
pub mod hardware;
pub mod api;

// Re-export commonly used types
pub use core::{GridCell, GridCoord, Heading, Path, RobotPosition, WorldPoint};
pub use algorithms::{BeaconLocalizer, FixKind, LocalizationReport, LocalizerConfig, PathLossModel};
pub use mapping::{Explorer, MapLearner, OccupancyGrid, TraversabilityMap};
pub use planning::{PathPlanner, PlanError, PlannedPath, PlannerConfig};
pub use hardware::{BeaconScanner, GridObserver, RangeSensor, SensorError};
pub use api::{CallbackScanner, NavigationCore, ReadingSink};
pub use utils::{ConfigError, NavConfig};
