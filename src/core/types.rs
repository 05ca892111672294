//! Core data types for the navigation core

use crate::core::constants::INVALID_DISTANCE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer cell coordinate on the occupancy grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Euclidean distance in cells
    pub fn distance(&self, other: &GridCoord) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn manhattan(&self, other: &GridCoord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Continuous position in world units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &WorldPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Occupancy state of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GridCell {
    #[default]
    Unknown,
    Free,
    Wall,
}

impl GridCell {
    pub fn symbol(&self) -> char {
        match self {
            GridCell::Unknown => '?',
            GridCell::Free => '.',
            GridCell::Wall => '#',
        }
    }
}

/// Cardinal heading on the grid. `Up` is towards decreasing `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Heading {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl Heading {
    /// Unit cell offset for one move along this heading
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Heading::Up => (0, -1),
            Heading::Right => (1, 0),
            Heading::Down => (0, 1),
            Heading::Left => (-1, 0),
        }
    }

    /// Heading rotated 90 degrees counter-clockwise
    pub fn left(&self) -> Heading {
        match self {
            Heading::Up => Heading::Left,
            Heading::Left => Heading::Down,
            Heading::Down => Heading::Right,
            Heading::Right => Heading::Up,
        }
    }

    /// Heading rotated 90 degrees clockwise
    pub fn right(&self) -> Heading {
        match self {
            Heading::Up => Heading::Right,
            Heading::Right => Heading::Down,
            Heading::Down => Heading::Left,
            Heading::Left => Heading::Up,
        }
    }

    pub fn step(&self, from: GridCoord) -> GridCoord {
        let (dx, dy) = self.delta();
        from.offset(dx, dy)
    }
}

/// Raw reading delivered by a beacon scanner for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeaconReading {
    pub beacon_id: u16,
    pub rssi: f64,
}

impl BeaconReading {
    pub fn new(beacon_id: u16, rssi: f64) -> Self {
        Self { beacon_id, rssi }
    }
}

/// Beacon reading resolved against the static beacon map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconSample {
    pub id: u16,
    pub fixed_x: f64,
    pub fixed_y: f64,
    pub rssi: f64,
    /// Derived range, `None` when the reading fell outside the plausible window
    pub distance: Option<f64>,
}

impl BeaconSample {
    pub fn is_valid(&self) -> bool {
        self.distance.is_some()
    }

    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.fixed_x, self.fixed_y)
    }

    /// Distance with the invalid sentinel, as exported to collaborators
    pub fn distance_or_sentinel(&self) -> f64 {
        self.distance.unwrap_or(INVALID_DISTANCE)
    }
}

/// One range return from a map-learning sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSample {
    /// Angle relative to the grid x axis, degrees
    pub angle_deg: f64,
    /// Measured range in world units
    pub range: f64,
}

impl RangeSample {
    pub fn new(angle_deg: f64, range: f64) -> Self {
        Self { angle_deg, range }
    }
}

/// Position estimate produced by the beacon localizer.
///
/// A confidence of 0 means the estimate must not be trusted; it does not
/// mean the robot sits at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotPosition {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl RobotPosition {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self {
            x,
            y,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn point(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }

    pub fn is_trusted(&self) -> bool {
        self.confidence > 0.0
    }

    /// Same coordinates, confidence forced to zero
    pub fn distrusted(&self) -> Self {
        Self {
            confidence: 0.0,
            ..*self
        }
    }
}

/// Ordered cells from start to goal inclusive. Empty means "no path".
pub type Path = Vec<GridCoord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_rotation_round_trip() {
        for heading in [Heading::Up, Heading::Right, Heading::Down, Heading::Left] {
            assert_eq!(heading.left().right(), heading);
            assert_eq!(heading.left().left().left().left(), heading);
        }
        assert_eq!(Heading::Up.left(), Heading::Left);
        assert_eq!(Heading::Up.step(GridCoord::new(2, 2)), GridCoord::new(2, 1));
    }

    #[test]
    fn test_sample_sentinel() {
        let sample = BeaconSample {
            id: 1,
            fixed_x: 0.0,
            fixed_y: 0.0,
            rssi: -120.0,
            distance: None,
        };
        assert!(!sample.is_valid());
        assert_eq!(sample.distance_or_sentinel(), INVALID_DISTANCE);
    }

    #[test]
    fn test_robot_position_confidence_clamped() {
        assert_eq!(RobotPosition::new(1.0, 2.0, 1.7).confidence, 1.0);
        assert_eq!(RobotPosition::new(1.0, 2.0, -0.3).confidence, 0.0);
        let distrusted = RobotPosition::new(1.0, 2.0, 0.9).distrusted();
        assert_eq!((distrusted.x, distrusted.y), (1.0, 2.0));
        assert!(!distrusted.is_trusted());
    }
}
