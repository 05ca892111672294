//! Left-wall-following explorer that builds the initial map.
//!
//! Unknown cells are treated as enterable; every entered cell is marked
//! `Free`. This is a heuristic follower, so open interiors away from walls
//! may stay `Unknown`.

use crate::core::{GridCell, GridCoord, Heading};
use crate::mapping::OccupancyGrid;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Maximum number of evaluation steps per exploration
    pub step_budget: usize,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self { step_budget: 1000 }
    }
}

/// Summary of one exploration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub start: GridCoord,
    /// Cell the robot ended on
    pub end: GridCoord,
    /// Heading the robot ended with
    pub heading: Heading,
    /// Evaluation steps consumed (rotations included)
    pub steps: usize,
    /// Cell-to-cell moves made
    pub moves: usize,
    /// Robot returned to its start cell
    pub closed_loop: bool,
    /// Distinct cells entered, in first-visit order
    pub visited: Vec<GridCoord>,
    /// Cells whose state changed to `Free`
    pub newly_freed: usize,
}

/// Wall follower; keeps its heading between runs
#[derive(Debug, Clone, Default)]
pub struct Explorer {
    config: ExplorerConfig,
    heading: Heading,
}

impl Explorer {
    pub fn new(config: ExplorerConfig) -> Self {
        Self {
            config,
            heading: Heading::default(),
        }
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn set_heading(&mut self, heading: Heading) {
        self.heading = heading;
    }

    /// Explore with the configured step budget
    pub fn explore_from(&mut self, grid: &mut OccupancyGrid, start: GridCoord) -> ExplorationReport {
        self.explore(grid, start, self.config.step_budget)
    }

    /// Follow the left wall from `start` until the budget runs out or the
    /// robot is back on `start` after more than one move
    pub fn explore(&mut self, grid: &mut OccupancyGrid, start: GridCoord, step_budget: usize) -> ExplorationReport {
        let mut report = ExplorationReport {
            start,
            end: start,
            heading: self.heading,
            steps: 0,
            moves: 0,
            closed_loop: false,
            visited: Vec::new(),
            newly_freed: 0,
        };

        if grid.is_wall(start) {
            warn!(
                "[Explorer] start ({}, {}) is a wall or outside the grid, not exploring",
                start.x, start.y
            );
            return report;
        }

        let mut seen = vec![false; grid.width() * grid.height()];
        let mut robot = start;
        Self::enter(grid, robot, &mut seen, &mut report);

        while report.steps < step_budget {
            report.steps += 1;

            let left = self.heading.left();
            let left_cell = left.step(robot);

            if !grid.is_wall(left_cell) {
                self.heading = left;
                robot = left_cell;
            } else {
                let ahead = self.heading.step(robot);
                if !grid.is_wall(ahead) {
                    robot = ahead;
                } else {
                    self.heading = self.heading.right();
                    trace!("[Explorer] blocked at ({}, {}), turning to {:?}", robot.x, robot.y, self.heading);
                    continue;
                }
            }

            report.moves += 1;
            Self::enter(grid, robot, &mut seen, &mut report);

            if robot == start && report.moves > 1 {
                report.closed_loop = true;
                break;
            }
        }

        report.end = robot;
        report.heading = self.heading;

        if report.closed_loop {
            info!(
                "[Explorer] closed loop after {} steps ({} moves), {} cells visited",
                report.steps,
                report.moves,
                report.visited.len()
            );
        } else {
            debug!(
                "[Explorer] step budget {} exhausted at ({}, {}) after {} moves",
                step_budget, robot.x, robot.y, report.moves
            );
        }

        report
    }

    fn enter(grid: &mut OccupancyGrid, cell: GridCoord, seen: &mut [bool], report: &mut ExplorationReport) {
        if grid.set(cell, GridCell::Free) {
            report.newly_freed += 1;
        }
        let index = cell.y as usize * grid.width() + cell.x as usize;
        if !seen[index] {
            seen[index] = true;
            report.visited.push(cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Room with a wall border and an `Unknown` interior
    fn walled_room(width: usize, height: usize) -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(width, height, 1.0);
        for x in 0..width as i32 {
            grid.set_obstacle(GridCoord::new(x, 0), true);
            grid.set_obstacle(GridCoord::new(x, height as i32 - 1), true);
        }
        for y in 0..height as i32 {
            grid.set_obstacle(GridCoord::new(0, y), true);
            grid.set_obstacle(GridCoord::new(width as i32 - 1, y), true);
        }
        grid
    }

    #[test]
    fn test_enclosed_room_closes_loop() {
        let mut grid = walled_room(6, 4);
        let mut explorer = Explorer::default();
        let start = GridCoord::new(1, 1);

        let report = explorer.explore(&mut grid, start, 1000);

        assert!(report.closed_loop);
        assert_eq!(report.end, start);
        assert!(report.moves > 1);
        assert_eq!(report.steps, 12);
        assert_eq!(report.moves, 8);
        assert_eq!(report.visited.len(), 8);
        assert_eq!(grid.count(GridCell::Unknown), 0);
        assert_eq!(grid.count(GridCell::Free), 8);
    }

    #[test]
    fn test_budget_stops_exploration() {
        let mut grid = walled_room(6, 4);
        let mut explorer = Explorer::default();

        let report = explorer.explore(&mut grid, GridCoord::new(1, 1), 3);

        assert!(!report.closed_loop);
        assert_eq!(report.steps, 3);
        assert_eq!(report.moves, 2);
        assert_eq!(explorer.heading(), Heading::Right);
    }

    #[test]
    fn test_wall_start_is_rejected() {
        let mut grid = walled_room(6, 4);
        let revision = grid.obstacle_revision();
        let mut explorer = Explorer::default();

        let report = explorer.explore(&mut grid, GridCoord::new(0, 0), 100);
        assert_eq!(report.steps, 0);
        assert!(report.visited.is_empty());
        assert_eq!(grid.obstacle_revision(), revision);

        let report = explorer.explore(&mut grid, GridCoord::new(10, 10), 100);
        assert_eq!(report.steps, 0);
    }

    #[test]
    fn test_start_cell_is_marked_free() {
        let mut grid = walled_room(6, 4);
        let mut explorer = Explorer::default();
        let report = explorer.explore(&mut grid, GridCoord::new(2, 2), 0);

        assert_eq!(report.newly_freed, 1);
        assert!(grid.is_free(GridCoord::new(2, 2)));
    }
}
