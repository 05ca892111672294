//! Turn-minimizing A* over the occupancy grid.
//!
//! Nodes live in an arena and refer to their parent by index. The open set is
//! a binary heap of arena indices ordered by `f`, then turn count, then `h`.
//! Instead of decrease-key, the best `(g, turns)` per cell is tracked and
//! stale heap entries are skipped when popped.

use crate::core::{GridCoord, Path};
use crate::mapping::OccupancyGrid;
use crate::planning::cache::{CacheStatistics, PathCache};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use thiserror::Error;

/// Neighbourhood used for expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Orthogonal moves only
    Four,
    /// Orthogonal and diagonal moves
    #[default]
    Eight,
}

impl Connectivity {
    fn moves(&self) -> &'static [(i32, i32)] {
        const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
        const ALL: [(i32, i32); 8] = [(0, -1), (1, 0), (0, 1), (-1, 0), (1, -1), (1, 1), (-1, 1), (-1, -1)];
        match self {
            Connectivity::Four => &ORTHOGONAL,
            Connectivity::Eight => &ALL,
        }
    }

    /// Admissible heuristic for this move set
    pub fn heuristic(&self) -> Heuristic {
        match self {
            Connectivity::Four => Heuristic::Manhattan,
            Connectivity::Eight => Heuristic::Euclidean,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    Euclidean,
    Manhattan,
}

impl Heuristic {
    pub fn estimate(&self, from: GridCoord, to: GridCoord) -> f64 {
        match self {
            Heuristic::Euclidean => from.distance(&to),
            Heuristic::Manhattan => from.manhattan(&to) as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub connectivity: Connectivity,
    /// Treat `Unknown` cells as traversable
    pub allow_unknown: bool,
    /// Allow diagonal moves past a blocked orthogonal neighbour. When false a
    /// diagonal needs both orthogonal neighbours clear.
    pub allow_corner_cutting: bool,
    /// `f` values closer than this are considered equal
    pub tie_epsilon: f64,
    /// Cached queries held before the cache is flushed
    pub cache_capacity: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Eight,
            allow_unknown: false,
            allow_corner_cutting: true,
            tie_epsilon: 1e-6,
            cache_capacity: 64,
        }
    }
}

/// Why a planning query produced no path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("cell {coord} is outside the grid")]
    OutOfBounds { coord: GridCoord },
    #[error("start cell {coord} is not traversable")]
    StartBlocked { coord: GridCoord },
    #[error("goal cell {coord} is not traversable")]
    GoalBlocked { coord: GridCoord },
    #[error("no path exists after expanding {expanded} nodes")]
    NoPath { expanded: usize },
}

/// Successful search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPath {
    /// Cells from start to goal inclusive
    pub cells: Path,
    /// Sum of step costs (1 orthogonal, sqrt(2) diagonal)
    pub cost: f64,
    /// Direction changes along the path
    pub turns: u32,
    pub nodes_expanded: usize,
}

#[derive(Debug, Clone, Copy)]
struct SearchNode {
    coord: GridCoord,
    g: f64,
    parent: Option<usize>,
    /// Move that reached this node, `None` for the start
    direction: Option<(i32, i32)>,
    turns: u32,
}

/// Heap entry; the greatest entry is the one to expand next
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f: f64,
    h: f64,
    turns: u32,
    index: usize,
    epsilon: f64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

// Approximate order: `f` values within epsilon compare equal, so this is not
// transitive across long chains of near-equal entries. The heap only needs a
// consistent pop order.
impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed comparisons turn the max-heap into a min-heap
        if (self.f - other.f).abs() > self.epsilon {
            return other.f.total_cmp(&self.f);
        }
        other
            .turns
            .cmp(&self.turns)
            .then_with(|| other.h.total_cmp(&self.h))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* planner with a revision-checked result cache
pub struct PathPlanner {
    config: PlannerConfig,
    heuristic: Heuristic,
    cache: PathCache,
}

impl PathPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            heuristic: config.connectivity.heuristic(),
            cache: PathCache::new(config.cache_capacity),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PlannerConfig::default())
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn cache_statistics(&self) -> CacheStatistics {
        self.cache.statistics()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Path from `start` to `goal`, empty when none exists
    pub fn find_path(&mut self, grid: &OccupancyGrid, start: GridCoord, goal: GridCoord) -> Path {
        self.plan(grid, start, goal).map(|planned| planned.cells).unwrap_or_default()
    }

    /// Cached search that reports why a query failed
    pub fn plan(&mut self, grid: &OccupancyGrid, start: GridCoord, goal: GridCoord) -> Result<PlannedPath, PlanError> {
        let revision = grid.obstacle_revision();
        if let Some(cached) = self.cache.get(start, goal, revision) {
            trace!(
                "[Pathfinder] cache hit ({}, {}) -> ({}, {})",
                start.x, start.y, goal.x, goal.y
            );
            return cached;
        }

        let result = self.search(grid, start, goal);
        self.cache.insert(start, goal, revision, result.clone());
        result
    }

    /// Uncached A* search
    pub fn search(&self, grid: &OccupancyGrid, start: GridCoord, goal: GridCoord) -> Result<PlannedPath, PlanError> {
        debug!(
            "[Pathfinder] searching ({}, {}) -> ({}, {})",
            start.x, start.y, goal.x, goal.y
        );

        for coord in [start, goal] {
            if !grid.in_bounds(coord) {
                debug!("[Pathfinder] FAILED: ({}, {}) out of bounds", coord.x, coord.y);
                return Err(PlanError::OutOfBounds { coord });
            }
        }
        if !self.passable(grid, start) {
            debug!("[Pathfinder] FAILED: start blocked");
            return Err(PlanError::StartBlocked { coord: start });
        }
        if !self.passable(grid, goal) {
            debug!("[Pathfinder] FAILED: goal blocked");
            return Err(PlanError::GoalBlocked { coord: goal });
        }

        let width = grid.width();
        let cell_index = |coord: GridCoord| coord.y as usize * width + coord.x as usize;
        let epsilon = self.config.tie_epsilon;

        let mut arena: Vec<SearchNode> = Vec::new();
        let mut best: Vec<Option<(f64, u32)>> = vec![None; width * grid.height()];
        let mut open = BinaryHeap::new();

        let h_start = self.heuristic.estimate(start, goal);
        arena.push(SearchNode {
            coord: start,
            g: 0.0,
            parent: None,
            direction: None,
            turns: 0,
        });
        best[cell_index(start)] = Some((0.0, 0));
        open.push(OpenEntry {
            f: h_start,
            h: h_start,
            turns: 0,
            index: 0,
            epsilon,
        });

        let mut expanded = 0;

        while let Some(entry) = open.pop() {
            let node = arena[entry.index];

            // Superseded by a cheaper or straighter arrival
            if best[cell_index(node.coord)] != Some((node.g, node.turns)) {
                continue;
            }
            expanded += 1;

            if node.coord == goal {
                let planned = Self::reconstruct(&arena, entry.index, expanded);
                debug!(
                    "[Pathfinder] path found: {} cells, cost {:.3}, {} turns, {} expanded",
                    planned.cells.len(),
                    planned.cost,
                    planned.turns,
                    expanded
                );
                return Ok(planned);
            }

            for &(dx, dy) in self.config.connectivity.moves() {
                let next = node.coord.offset(dx, dy);
                if !self.passable(grid, next) {
                    continue;
                }

                let diagonal = dx != 0 && dy != 0;
                if diagonal
                    && !self.config.allow_corner_cutting
                    && (!self.passable(grid, node.coord.offset(dx, 0)) || !self.passable(grid, node.coord.offset(0, dy)))
                {
                    continue;
                }

                let g = node.g + if diagonal { std::f64::consts::SQRT_2 } else { 1.0 };
                let turned = node.direction.is_some_and(|direction| direction != (dx, dy));
                let turns = node.turns + u32::from(turned);

                let slot = &mut best[cell_index(next)];
                if let Some((best_g, best_turns)) = *slot {
                    let cheaper = g < best_g - epsilon;
                    let straighter = (g - best_g).abs() <= epsilon && turns < best_turns;
                    if !cheaper && !straighter {
                        continue;
                    }
                }
                *slot = Some((g, turns));

                let h = self.heuristic.estimate(next, goal);
                arena.push(SearchNode {
                    coord: next,
                    g,
                    parent: Some(entry.index),
                    direction: Some((dx, dy)),
                    turns,
                });
                trace!(
                    "[Pathfinder] open ({}, {}) g={:.3} h={:.3} turns={}",
                    next.x, next.y, g, h, turns
                );
                open.push(OpenEntry {
                    f: g + h,
                    h,
                    turns,
                    index: arena.len() - 1,
                    epsilon,
                });
            }
        }

        debug!("[Pathfinder] FAILED: no path after {} expansions", expanded);
        Err(PlanError::NoPath { expanded })
    }

    /// Moves needed to reach each target from `start`, `None` when unreachable
    pub fn path_lengths(&mut self, grid: &OccupancyGrid, start: GridCoord, targets: &[GridCoord]) -> Vec<Option<usize>> {
        targets
            .iter()
            .map(|&target| {
                self.plan(grid, start, target)
                    .ok()
                    .map(|planned| planned.cells.len().saturating_sub(1))
            })
            .collect()
    }

    fn passable(&self, grid: &OccupancyGrid, coord: GridCoord) -> bool {
        grid.is_traversable(coord, self.config.allow_unknown)
    }

    fn reconstruct(arena: &[SearchNode], goal_index: usize, nodes_expanded: usize) -> PlannedPath {
        let goal = &arena[goal_index];
        let mut cells = Vec::new();
        let mut cursor = Some(goal_index);
        while let Some(index) = cursor {
            cells.push(arena[index].coord);
            cursor = arena[index].parent;
        }
        cells.reverse();

        PlannedPath {
            cells,
            cost: goal.g,
            turns: goal.turns,
            nodes_expanded,
        }
    }
}
