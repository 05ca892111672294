//! Fixed-size occupancy grid shared by the explorer, learner and planner

use crate::core::{GridCell, GridCoord, WorldPoint};
use log::trace;
use serde::{Deserialize, Serialize};

/// 2D occupancy grid of `Unknown`/`Free`/`Wall` cells.
///
/// Out-of-bounds reads are `Wall`. Every write that changes a cell bumps the
/// obstacle revision, which path caches compare against before serving a hit.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    /// World units per cell edge
    cell_size: f64,
    cells: Vec<GridCell>,
    revision: u64,
}

impl OccupancyGrid {
    /// Grid with every cell `Unknown`
    pub fn new(width: usize, height: usize, cell_size: f64) -> Self {
        Self::filled(width, height, cell_size, GridCell::Unknown)
    }

    pub fn filled(width: usize, height: usize, cell_size: f64, cell: GridCell) -> Self {
        Self {
            width,
            height,
            cell_size,
            cells: vec![cell; width * height],
            revision: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn in_bounds(&self, coord: GridCoord) -> bool {
        coord.x >= 0 && coord.y >= 0 && (coord.x as usize) < self.width && (coord.y as usize) < self.height
    }

    fn index(&self, coord: GridCoord) -> Option<usize> {
        self.in_bounds(coord)
            .then(|| coord.y as usize * self.width + coord.x as usize)
    }

    /// Cell state, `Wall` when out of bounds
    pub fn get(&self, coord: GridCoord) -> GridCell {
        self.index(coord).map_or(GridCell::Wall, |index| self.cells[index])
    }

    /// Write one cell. Returns `true` if the stored value changed.
    pub fn set(&mut self, coord: GridCoord, cell: GridCell) -> bool {
        let Some(index) = self.index(coord) else {
            trace!("[OccupancyGrid] ignoring write outside grid at ({}, {})", coord.x, coord.y);
            return false;
        };

        if self.cells[index] == cell {
            return false;
        }

        self.cells[index] = cell;
        self.revision += 1;
        true
    }

    /// Mark a cell `Wall` or `Free`
    pub fn set_obstacle(&mut self, coord: GridCoord, is_wall: bool) -> bool {
        self.set(coord, if is_wall { GridCell::Wall } else { GridCell::Free })
    }

    pub fn is_wall(&self, coord: GridCoord) -> bool {
        self.get(coord) == GridCell::Wall
    }

    pub fn is_free(&self, coord: GridCoord) -> bool {
        self.get(coord) == GridCell::Free
    }

    /// Free cells are traversable; `Unknown` only when the caller opts in
    pub fn is_traversable(&self, coord: GridCoord, allow_unknown: bool) -> bool {
        match self.get(coord) {
            GridCell::Free => true,
            GridCell::Unknown => allow_unknown,
            GridCell::Wall => false,
        }
    }

    /// Incremented on every cell change
    pub fn obstacle_revision(&self) -> u64 {
        self.revision
    }

    /// Number of cells in the given state
    pub fn count(&self, cell: GridCell) -> usize {
        self.cells.iter().filter(|c| **c == cell).count()
    }

    /// Every cell with its coordinate, row-major
    pub fn iter(&self) -> impl Iterator<Item = (GridCoord, GridCell)> + '_ {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(index, cell)| {
            (GridCoord::new((index % width) as i32, (index / width) as i32), *cell)
        })
    }

    /// Binary free/blocked export of the grid
    pub fn traversability(&self, allow_unknown: bool) -> TraversabilityMap {
        TraversabilityMap {
            width: self.width,
            height: self.height,
            blocked: self
                .iter()
                .map(|(coord, _)| !self.is_traversable(coord, allow_unknown))
                .collect(),
        }
    }

    /// Cell containing a world position, `None` outside the grid
    pub fn world_to_grid(&self, point: WorldPoint) -> Option<GridCoord> {
        if !point.is_finite() {
            return None;
        }
        let x = (point.x / self.cell_size).floor();
        let y = (point.y / self.cell_size).floor();
        if x < i32::MIN as f64 || x > i32::MAX as f64 || y < i32::MIN as f64 || y > i32::MAX as f64 {
            return None;
        }
        let coord = GridCoord::new(x as i32, y as i32);
        self.in_bounds(coord).then_some(coord)
    }

    /// World position of a cell's centre
    pub fn grid_to_world(&self, coord: GridCoord) -> WorldPoint {
        WorldPoint::new(
            (coord.x as f64 + 0.5) * self.cell_size,
            (coord.y as f64 + 0.5) * self.cell_size,
        )
    }

    /// World-space extent `(width, height)`
    pub fn extent(&self) -> (f64, f64) {
        (self.width as f64 * self.cell_size, self.height as f64 * self.cell_size)
    }

    /// ASCII rendering, one row per line
    pub fn render(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in self.cells.chunks(self.width.max(1)) {
            out.extend(row.iter().map(GridCell::symbol));
            out.push('\n');
        }
        out
    }
}

/// Planner-facing binary view of the grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversabilityMap {
    pub width: usize,
    pub height: usize,
    /// Row-major, `true` = blocked
    pub blocked: Vec<bool>,
}

impl TraversabilityMap {
    pub fn is_blocked(&self, coord: GridCoord) -> bool {
        if coord.x < 0 || coord.y < 0 || coord.x as usize >= self.width || coord.y as usize >= self.height {
            return true;
        }
        self.blocked[coord.y as usize * self.width + coord.x as usize]
    }

    /// Rows of `0` (free) and `1` (blocked)
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.blocked
            .chunks(self.width.max(1))
            .map(|row| row.iter().map(|blocked| u8::from(*blocked)).collect())
            .collect()
    }
}
