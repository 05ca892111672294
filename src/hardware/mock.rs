//! Mock sensor adapters for testing and simulation

use crate::algorithms::rssi::PathLossModel;
use crate::core::{BeaconReading, GridCoord, RangeSample, WorldPoint};
use crate::hardware::{BeaconScanner, GridObserver, RangeSensor, SensorError, SensorResult};
use crate::mapping::OccupancyGrid;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Mock beacon scanner that synthesizes RSSI from a known robot position
pub struct MockBeaconScanner {
    id: u8,
    model: PathLossModel,
    beacons: Vec<(u16, WorldPoint)>,
    robot: WorldPoint,
    rssi_offsets: Vec<(u16, f64)>,
    queued_batches: VecDeque<Vec<BeaconReading>>,
    failures_remaining: u32,
    connected: bool,
    scans: u32,
}

impl MockBeaconScanner {
    /// Create a new mock scanner using the given propagation model
    pub fn new(id: u8, model: PathLossModel) -> Self {
        Self {
            id,
            model,
            beacons: Vec::new(),
            robot: WorldPoint::default(),
            rssi_offsets: Vec::new(),
            queued_batches: VecDeque::new(),
            failures_remaining: 0,
            connected: true,
            scans: 0,
        }
    }

    pub fn with_beacon(mut self, beacon_id: u16, x: f64, y: f64) -> Self {
        self.beacons.push((beacon_id, WorldPoint::new(x, y)));
        self
    }

    /// Move the simulated robot
    pub fn set_robot_position(&mut self, x: f64, y: f64) {
        self.robot = WorldPoint::new(x, y);
    }

    /// Add a fixed bias (dB) to one beacon's synthesized RSSI, e.g. to model multipath
    pub fn set_rssi_offset(&mut self, beacon_id: u16, offset_db: f64) {
        self.rssi_offsets.retain(|(id, _)| *id != beacon_id);
        self.rssi_offsets.push((beacon_id, offset_db));
    }

    /// Queue an explicit batch; queued batches are returned before synthesized ones
    pub fn queue_batch(&mut self, batch: Vec<BeaconReading>) {
        self.queued_batches.push_back(batch);
    }

    /// Make the next `count` scans fail with a timeout
    pub fn fail_next(&mut self, count: u32) {
        self.failures_remaining = count;
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn reconnect(&mut self) {
        self.connected = true;
    }

    /// Number of scan cycles attempted so far
    pub fn scan_count(&self) -> u32 {
        self.scans
    }

    fn synthesize(&self) -> Vec<BeaconReading> {
        self.beacons
            .iter()
            .map(|(beacon_id, position)| {
                let offset = self
                    .rssi_offsets
                    .iter()
                    .find(|(id, _)| id == beacon_id)
                    .map_or(0.0, |(_, offset)| *offset);
                let rssi = self.model.rssi_at(self.robot.distance(position)) + offset;
                BeaconReading::new(*beacon_id, rssi)
            })
            .collect()
    }
}

impl BeaconScanner for MockBeaconScanner {
    fn scan(&mut self) -> SensorResult<Vec<BeaconReading>> {
        self.scans += 1;

        if !self.connected {
            return Err(SensorError::ConnectionLost { sensor_id: self.id });
        }

        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(SensorError::Timeout { timeout_ms: 5000 });
        }

        if let Some(batch) = self.queued_batches.pop_front() {
            return Ok(batch);
        }

        Ok(self.synthesize())
    }
}

/// Mock range sensor that ray-marches a ground-truth grid
pub struct MockRangeSensor {
    truth: OccupancyGrid,
    max_range: f64,
    sweeps: u32,
    connected: bool,
}

impl MockRangeSensor {
    pub fn new(truth: OccupancyGrid, max_range: f64) -> Self {
        Self {
            truth,
            max_range,
            sweeps: 0,
            connected: true,
        }
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn sweep_count(&self) -> u32 {
        self.sweeps
    }

    /// Range from the centre of `origin` to the near face of the first wall along the angle
    fn range_along(&self, origin: GridCoord, angle_deg: f64) -> f64 {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let cell_size = self.truth.cell_size();
        let max_cells = (self.max_range / cell_size).ceil() as i32 + 1;

        for k in 1..=max_cells {
            let cell = origin.offset(
                (k as f64 * cos).round() as i32,
                (k as f64 * sin).round() as i32,
            );
            if self.truth.is_wall(cell) {
                return ((k as f64 - 0.5) * cell_size).min(self.max_range);
            }
        }

        self.max_range
    }
}

impl RangeSensor for MockRangeSensor {
    fn sweep(&mut self, origin: GridCoord, angles_deg: &[f64]) -> SensorResult<Vec<RangeSample>> {
        self.sweeps += 1;

        if !self.connected {
            return Err(SensorError::ConnectionLost { sensor_id: 0 });
        }
        if !(self.max_range.is_finite() && self.max_range > 0.0) {
            return Err(SensorError::ConfigurationError {
                parameter: "max_range".to_string(),
                value: self.max_range.to_string(),
            });
        }
        if let Some(angle) = angles_deg.iter().find(|angle| !angle.is_finite()) {
            return Err(SensorError::InvalidReading {
                details: format!("sweep angle {}", angle),
            });
        }

        Ok(angles_deg
            .iter()
            .map(|&angle| RangeSample::new(angle, self.range_along(origin, angle)))
            .collect())
    }
}

/// Observer that records every revision it is notified of
#[derive(Default, Clone)]
pub struct RecordingObserver {
    revisions: Rc<RefCell<Vec<u64>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revisions(&self) -> Vec<u64> {
        self.revisions.borrow().clone()
    }

    pub fn notification_count(&self) -> usize {
        self.revisions.borrow().len()
    }
}

impl GridObserver for RecordingObserver {
    fn grid_changed(&mut self, revision: u64) {
        self.revisions.borrow_mut().push(revision);
    }
}
