//! Waypoint reduction and path diagnostics

use crate::core::{GridCoord, Path};
use crate::mapping::OccupancyGrid;
use log::debug;

/// Drop interior waypoints whose neighbours can see each other.
///
/// Each waypoint is tested against the last waypoint kept, so consecutive
/// kept waypoints are always joined by a clear segment.
pub fn optimize_path(grid: &OccupancyGrid, path: &[GridCoord], allow_unknown: bool) -> Path {
    if path.len() <= 2 {
        return path.to_vec();
    }

    let mut optimized = vec![path[0]];
    for i in 1..path.len() - 1 {
        let anchor = optimized[optimized.len() - 1];
        if !segment_is_clear(grid, anchor, path[i + 1], allow_unknown) {
            optimized.push(path[i]);
        }
    }
    optimized.push(path[path.len() - 1]);

    debug!("[Pathfinder] path optimized: {} -> {} waypoints", path.len(), optimized.len());
    optimized
}

/// Every cell sampled at unit steps between `from` and `to` is traversable
pub fn segment_is_clear(grid: &OccupancyGrid, from: GridCoord, to: GridCoord, allow_unknown: bool) -> bool {
    let dx = (to.x - from.x) as f64;
    let dy = (to.y - from.y) as f64;
    let steps = (to.x - from.x).abs().max((to.y - from.y).abs());

    (1..steps).all(|step| {
        let t = step as f64 / steps as f64;
        let cell = GridCoord::new(
            from.x + (dx * t).round() as i32,
            from.y + (dy * t).round() as i32,
        );
        grid.is_traversable(cell, allow_unknown)
    })
}

/// Euclidean length along the waypoints
pub fn path_cost(path: &[GridCoord]) -> f64 {
    path.windows(2).map(|pair| pair[0].distance(&pair[1])).sum()
}

/// Number of heading changes between consecutive segments
pub fn count_turns(path: &[GridCoord]) -> u32 {
    let segments: Vec<(i32, i32)> = path
        .windows(2)
        .map(|pair| (pair[1].x - pair[0].x, pair[1].y - pair[0].y))
        .filter(|&(dx, dy)| dx != 0 || dy != 0)
        .collect();

    segments
        .windows(2)
        .filter(|pair| {
            let ((ax, ay), (bx, by)) = (pair[0], pair[1]);
            let cross = ax * by - ay * bx;
            let dot = ax * bx + ay * by;
            cross != 0 || dot <= 0
        })
        .count() as u32
}

/// ASCII map with the path overlaid: `S` start, `G` goal, `*` waypoints
pub fn render_path(grid: &OccupancyGrid, path: &[GridCoord]) -> String {
    let mut rows: Vec<Vec<char>> = grid
        .render()
        .lines()
        .map(|line| line.chars().collect())
        .collect();

    let mut mark = |coord: GridCoord, symbol: char| {
        if grid.in_bounds(coord) {
            rows[coord.y as usize][coord.x as usize] = symbol;
        }
    };

    for &cell in path {
        mark(cell, '*');
    }
    if let (Some(&start), Some(&goal)) = (path.first(), path.last()) {
        mark(start, 'S');
        mark(goal, 'G');
    }

    rows.into_iter()
        .map(|row| row.into_iter().collect::<String>() + "\n")
        .collect()
}
