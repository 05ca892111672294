//! Occupancy map and the components that populate it

pub mod occupancy;
pub mod explorer;
pub mod learner;

pub use occupancy::{OccupancyGrid, TraversabilityMap};
pub use explorer::{ExplorationReport, Explorer, ExplorerConfig};
pub use learner::{LearnerConfig, MapLearner};
