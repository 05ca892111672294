//! Grid path planning

pub mod astar;
pub mod cache;
pub mod smoothing;

pub use astar::{Connectivity, Heuristic, PathPlanner, PlanError, PlannedPath, PlannerConfig};
pub use cache::{CacheStatistics, PathCache};
pub use smoothing::{count_turns, optimize_path, path_cost, render_path, segment_is_clear};
