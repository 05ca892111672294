//! Sweep-based obstacle learning.
//!
//! Hits are collected in a learner-local buffer and only reach the shared
//! grid through [`MapLearner::apply`], so a planner never sees a half-learned map.

use crate::core::{GridCoord, RangeSample};
use crate::hardware::RangeSensor;
use crate::mapping::OccupancyGrid;
use crate::validation::SampleValidator;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Ranges below this (world units) mark the neighbouring cell as a wall
    pub obstacle_threshold: f64,
    /// Sweep every n-th cell along each axis
    pub scan_stride: usize,
    /// Sweep angles relative to the grid x axis, degrees
    pub angles_deg: Vec<f64>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            obstacle_threshold: 0.5,
            scan_stride: 1,
            angles_deg: vec![0.0, 90.0, 180.0, 270.0],
        }
    }
}

pub struct MapLearner {
    config: LearnerConfig,
    validator: SampleValidator,
    width: usize,
    height: usize,
    learned: Vec<bool>,
}

impl MapLearner {
    pub fn new(width: usize, height: usize, config: LearnerConfig) -> Self {
        Self {
            config,
            validator: SampleValidator::default(),
            width,
            height,
            learned: vec![false; width * height],
        }
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    fn index(&self, coord: GridCoord) -> Option<usize> {
        (coord.x >= 0 && coord.y >= 0 && (coord.x as usize) < self.width && (coord.y as usize) < self.height)
            .then(|| coord.y as usize * self.width + coord.x as usize)
    }

    /// Whether the buffer currently holds a wall at `coord`
    pub fn is_marked(&self, coord: GridCoord) -> bool {
        self.index(coord).is_some_and(|index| self.learned[index])
    }

    pub fn obstacle_count(&self) -> usize {
        self.learned.iter().filter(|marked| **marked).count()
    }

    /// Fold one sweep taken at `origin` into the buffer. Returns the number of
    /// hits that landed inside the grid.
    pub fn record_sweep(&mut self, origin: GridCoord, samples: &[RangeSample]) -> usize {
        let mut hits = 0;

        for sample in samples {
            if let Err(reason) = self.validator.validate_range(sample) {
                trace!("[MapLearner] discarding range at {}°: {}", sample.angle_deg, reason);
                continue;
            }
            if sample.range >= self.config.obstacle_threshold {
                continue;
            }

            let (sin, cos) = sample.angle_deg.to_radians().sin_cos();
            let obstacle = origin.offset(cos.round() as i32, sin.round() as i32);

            if let Some(index) = self.index(obstacle) {
                self.learned[index] = true;
                hits += 1;
                trace!(
                    "[MapLearner] obstacle at ({}, {}) from ({}, {}) at {}°",
                    obstacle.x, obstacle.y, origin.x, origin.y, sample.angle_deg
                );
            }
        }

        hits
    }

    /// Sweep every `scan_stride`-th cell. A failed sweep is skipped.
    /// Returns the number of marked cells in the buffer afterwards.
    pub fn learn_map(&mut self, sensor: &mut dyn RangeSensor) -> usize {
        info!("[MapLearner] starting map learning over {}x{} grid", self.width, self.height);
        let stride = self.config.scan_stride.max(1);
        let angles = self.config.angles_deg.clone();
        let mut failed = 0usize;

        for y in (0..self.height).step_by(stride) {
            for x in (0..self.width).step_by(stride) {
                let origin = GridCoord::new(x as i32, y as i32);
                match sensor.sweep(origin, &angles) {
                    Ok(samples) => {
                        self.record_sweep(origin, &samples);
                    }
                    Err(err) => {
                        failed += 1;
                        warn!(
                            "[MapLearner] sweep at ({}, {}) failed: {} ({:?})",
                            x,
                            y,
                            err,
                            err.recovery_strategy()
                        );
                    }
                }
            }
        }

        let marked = self.obstacle_count();
        info!("[MapLearner] map learning complete: {} obstacle cells, {} failed sweeps", marked, failed);
        marked
    }

    /// Commit the buffer: marked cells become `Wall`, all others `Free`.
    /// Returns the number of grid cells that changed.
    pub fn apply(&self, grid: &mut OccupancyGrid) -> usize {
        let mut changed = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                let coord = GridCoord::new(x as i32, y as i32);
                if grid.set_obstacle(coord, self.learned[y * self.width + x]) {
                    changed += 1;
                }
            }
        }
        info!("[MapLearner] learned map applied, {} cells changed", changed);
        changed
    }

    /// Reset the buffer to all-clear
    pub fn clear(&mut self) {
        debug!("[MapLearner] clearing learned buffer");
        self.learned.fill(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GridCell;
    use crate::hardware::MockRangeSensor;

    #[test]
    fn test_record_sweep_projects_hits() {
        let mut learner = MapLearner::new(5, 5, LearnerConfig::default());
        let hits = learner.record_sweep(
            GridCoord::new(2, 2),
            &[
                RangeSample::new(0.0, 0.3),
                RangeSample::new(90.0, 0.2),
                RangeSample::new(180.0, 0.9),
                RangeSample::new(270.0, -1.0),
            ],
        );

        assert_eq!(hits, 2);
        assert!(learner.is_marked(GridCoord::new(3, 2)));
        assert!(learner.is_marked(GridCoord::new(2, 3)));
        assert!(!learner.is_marked(GridCoord::new(1, 2)));
        assert!(!learner.is_marked(GridCoord::new(2, 1)));
    }

    #[test]
    fn test_hits_outside_grid_are_dropped() {
        let mut learner = MapLearner::new(3, 3, LearnerConfig::default());
        assert_eq!(learner.record_sweep(GridCoord::new(0, 0), &[RangeSample::new(180.0, 0.1)]), 0);
        assert_eq!(learner.obstacle_count(), 0);
    }

    #[test]
    fn test_apply_and_clear() {
        let mut learner = MapLearner::new(3, 3, LearnerConfig::default());
        learner.record_sweep(GridCoord::new(1, 1), &[RangeSample::new(0.0, 0.1)]);

        let mut grid = OccupancyGrid::new(3, 3, 1.0);
        assert_eq!(learner.apply(&mut grid), 9);
        assert!(grid.is_wall(GridCoord::new(2, 1)));
        assert_eq!(grid.count(GridCell::Free), 8);

        // Re-applying the same buffer changes nothing
        assert_eq!(learner.apply(&mut grid), 0);

        learner.clear();
        assert_eq!(learner.obstacle_count(), 0);
        assert_eq!(learner.apply(&mut grid), 1);
        assert_eq!(grid.count(GridCell::Wall), 0);
    }

    #[test]
    fn test_learn_map_from_sensor() {
        // At 0.4 units per cell only an adjacent wall reads below the threshold
        let mut truth = OccupancyGrid::filled(5, 5, 0.4, GridCell::Free);
        truth.set_obstacle(GridCoord::new(2, 2), true);
        let mut sensor = MockRangeSensor::new(truth, 2.0);

        let mut learner = MapLearner::new(5, 5, LearnerConfig::default());
        learner.learn_map(&mut sensor);

        assert_eq!(sensor.sweep_count(), 25);
        assert!(learner.is_marked(GridCoord::new(2, 2)));

        let mut grid = OccupancyGrid::new(5, 5, 0.4);
        learner.apply(&mut grid);
        assert!(grid.is_wall(GridCoord::new(2, 2)));
        assert!(grid.is_free(GridCoord::new(1, 2)));
    }

    #[test]
    fn test_failed_sweeps_are_skipped() {
        let truth = OccupancyGrid::filled(3, 3, 0.25, GridCell::Free);
        let mut sensor = MockRangeSensor::new(truth, 2.0);
        sensor.disconnect();

        let mut learner = MapLearner::new(3, 3, LearnerConfig { scan_stride: 2, ..Default::default() });
        assert_eq!(learner.learn_map(&mut sensor), 0);
        assert_eq!(sensor.sweep_count(), 4);
    }
}
