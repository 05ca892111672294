//! Navigation core facade
//!
//! Owns the grid, localizer, explorer, learner and planner, and exposes one
//! control-loop tick worth of operations. Every operation that changes the
//! grid notifies the registered observers. Callers must not interleave ticks
//! from several threads; nothing here locks.

use crate::algorithms::localization::{BeaconLocalizer, LocalizationReport, Workspace};
use crate::api::callback::CallbackHandle;
use crate::core::{BeaconReading, GridCell, GridCoord, Path, RangeSample, RobotPosition};
use crate::hardware::{BeaconScanner, GridObserver, RangeSensor};
use crate::mapping::{ExplorationReport, Explorer, MapLearner, OccupancyGrid, TraversabilityMap};
use crate::planning::{self, CacheStatistics, PathPlanner, PlanError, PlannedPath};
use crate::utils::config::{ConfigError, NavConfig};
use log::{debug, info, warn};

pub struct NavigationCore {
    grid: OccupancyGrid,
    localizer: BeaconLocalizer,
    explorer: Explorer,
    learner: MapLearner,
    planner: PathPlanner,
    observers: Vec<(CallbackHandle, Box<dyn GridObserver>)>,
    observer_counter: u32,
}

impl NavigationCore {
    /// Build a core from a validated configuration
    pub fn new(config: &NavConfig) -> Result<Self, ConfigError> {
        let validation = config.check();
        for warning in &validation.warnings {
            warn!("[NavigationCore] {}", warning);
        }
        if let Some(error) = validation.errors.into_iter().next() {
            return Err(error);
        }

        let grid = OccupancyGrid::new(config.grid.width, config.grid.height, config.grid.cell_size);

        let mut localizer_config = config.localizer.clone();
        if localizer_config.workspace.is_none() {
            let (max_x, max_y) = grid.extent();
            localizer_config.workspace = Some(Workspace::new(0.0, 0.0, max_x, max_y));
        }
        let mut localizer = BeaconLocalizer::new(config.path_loss, localizer_config);
        for beacon in &config.beacons {
            localizer.set_beacon_position(beacon.id, beacon.x, beacon.y);
        }

        info!(
            "[NavigationCore] initialized {}x{} grid at {} units/cell with {} beacons",
            config.grid.width,
            config.grid.height,
            config.grid.cell_size,
            config.beacons.len()
        );

        Ok(Self {
            learner: MapLearner::new(grid.width(), grid.height(), config.learner.clone()),
            explorer: Explorer::new(config.explorer.clone()),
            planner: PathPlanner::new(config.planner.clone()),
            grid,
            localizer,
            observers: Vec::new(),
            observer_counter: 0,
        })
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn localizer(&self) -> &BeaconLocalizer {
        &self.localizer
    }

    pub fn learner(&self) -> &MapLearner {
        &self.learner
    }

    // Observers

    pub fn add_observer(&mut self, observer: Box<dyn GridObserver>) -> CallbackHandle {
        self.observer_counter += 1;
        let handle = CallbackHandle::new(self.observer_counter);
        self.observers.push((handle, observer));
        handle
    }

    pub fn remove_observer(&mut self, handle: CallbackHandle) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(registered, _)| *registered != handle);
        self.observers.len() != before
    }

    fn notify_grid_changed(&mut self) {
        let revision = self.grid.obstacle_revision();
        debug!(
            "[NavigationCore] grid revision {}, notifying {} observers",
            revision,
            self.observers.len()
        );
        for (_, observer) in &mut self.observers {
            observer.grid_changed(revision);
        }
    }

    // Grid mutation

    /// Mark a cell as wall or free. Returns `true` if the grid changed.
    pub fn set_obstacle(&mut self, coord: GridCoord, is_wall: bool) -> bool {
        self.set_cell(coord, if is_wall { GridCell::Wall } else { GridCell::Free })
    }

    pub fn set_cell(&mut self, coord: GridCoord, cell: GridCell) -> bool {
        let changed = self.grid.set(coord, cell);
        if changed {
            self.notify_grid_changed();
        }
        changed
    }

    /// Binary export of the committed map
    pub fn traversability(&self, allow_unknown: bool) -> TraversabilityMap {
        self.grid.traversability(allow_unknown)
    }

    // Exploration and learning

    /// Wall-follow from `start` using the configured step budget
    pub fn explore_from(&mut self, start: GridCoord) -> ExplorationReport {
        let budget = self.explorer.config().step_budget;
        self.explore_with_budget(start, budget)
    }

    pub fn explore_with_budget(&mut self, start: GridCoord, step_budget: usize) -> ExplorationReport {
        let report = self.explorer.explore(&mut self.grid, start, step_budget);
        if report.newly_freed > 0 {
            self.notify_grid_changed();
        }
        report
    }

    /// Sweep the whole grid with `sensor` into the learner buffer
    pub fn learn(&mut self, sensor: &mut dyn RangeSensor) -> usize {
        self.learner.learn_map(sensor)
    }

    pub fn record_sweep(&mut self, origin: GridCoord, samples: &[RangeSample]) -> usize {
        self.learner.record_sweep(origin, samples)
    }

    /// Commit the learner buffer to the grid
    pub fn apply_learned_map(&mut self) -> usize {
        let changed = self.learner.apply(&mut self.grid);
        if changed > 0 {
            self.notify_grid_changed();
        }
        changed
    }

    pub fn clear_learned_map(&mut self) {
        self.learner.clear();
    }

    // Localization

    /// Run one scan cycle and localize. A failed scan counts as an empty cycle.
    pub fn localize(&mut self, scanner: &mut dyn BeaconScanner) -> LocalizationReport {
        let batch = match scanner.scan() {
            Ok(batch) => batch,
            Err(err) => {
                warn!(
                    "[NavigationCore] beacon scan failed: {} (recovery: {:?})",
                    err,
                    err.recovery_strategy()
                );
                Vec::new()
            }
        };
        self.localize_batch(&batch)
    }

    /// Localize from an externally gathered batch
    pub fn localize_batch(&mut self, batch: &[BeaconReading]) -> LocalizationReport {
        self.localizer.ingest_scan(batch);
        self.localizer.localize()
    }

    pub fn set_beacon_position(&mut self, beacon_id: u16, x: f64, y: f64) {
        self.localizer.set_beacon_position(beacon_id, x, y);
    }

    pub fn current_position(&self) -> RobotPosition {
        self.localizer.current_position()
    }

    /// Grid cell of the current estimate, `None` when untrusted or off the grid
    pub fn robot_cell(&self) -> Option<GridCoord> {
        let position = self.localizer.current_position();
        if !position.is_trusted() {
            return None;
        }
        self.grid.world_to_grid(position.point())
    }

    // Planning

    /// Path from `start` to `goal`, empty when none exists
    pub fn find_path(&mut self, start: GridCoord, goal: GridCoord) -> Path {
        self.planner.find_path(&self.grid, start, goal)
    }

    pub fn plan(&mut self, start: GridCoord, goal: GridCoord) -> Result<PlannedPath, PlanError> {
        self.planner.plan(&self.grid, start, goal)
    }

    pub fn optimize_path(&self, path: &[GridCoord]) -> Path {
        planning::optimize_path(&self.grid, path, self.planner.config().allow_unknown)
    }

    pub fn render_path(&self, path: &[GridCoord]) -> String {
        planning::render_path(&self.grid, path)
    }

    /// Moves from `start` to each registered beacon's cell
    pub fn path_lengths_to_beacons(&mut self, start: GridCoord) -> Vec<(u16, Option<usize>)> {
        let targets: Vec<(u16, Option<GridCoord>)> = self
            .localizer
            .beacons()
            .map(|(id, position)| (id, self.grid.world_to_grid(position)))
            .collect();

        targets
            .into_iter()
            .map(|(id, cell)| {
                let length = cell.and_then(|cell| self.planner.path_lengths(&self.grid, start, &[cell])[0]);
                (id, length)
            })
            .collect()
    }

    pub fn cache_statistics(&self) -> CacheStatistics {
        self.planner.cache_statistics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::localization::FixKind;
    use crate::api::callback::CallbackScanner;
    use crate::hardware::{MockBeaconScanner, MockRangeSensor, RecordingObserver};
    use crate::utils::config::BeaconConfig;
    use approx::assert_relative_eq;

    /// 20x20 cells at 0.5 units, beacons on three corners of the 10x10 area
    fn test_config() -> NavConfig {
        let mut config = NavConfig::default();
        config.beacons = vec![
            BeaconConfig { id: 1, x: 0.0, y: 0.0 },
            BeaconConfig { id: 2, x: 10.0, y: 0.0 },
            BeaconConfig { id: 3, x: 0.0, y: 10.0 },
        ];
        config
    }

    fn scanner_for(config: &NavConfig) -> MockBeaconScanner {
        config
            .beacons
            .iter()
            .fold(MockBeaconScanner::new(1, config.path_loss), |scanner, beacon| {
                scanner.with_beacon(beacon.id, beacon.x, beacon.y)
            })
    }

    fn walled_core(width: usize, height: usize) -> NavigationCore {
        let mut config = test_config();
        config.grid.width = width;
        config.grid.height = height;
        let mut core = NavigationCore::new(&config).unwrap();
        for x in 0..width as i32 {
            core.set_obstacle(GridCoord::new(x, 0), true);
            core.set_obstacle(GridCoord::new(x, height as i32 - 1), true);
        }
        for y in 0..height as i32 {
            core.set_obstacle(GridCoord::new(0, y), true);
            core.set_obstacle(GridCoord::new(width as i32 - 1, y), true);
        }
        core
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = test_config();
        config.grid.width = 0;
        assert!(NavigationCore::new(&config).is_err());
    }

    #[test]
    fn test_localize_from_mock_scanner() {
        let config = test_config();
        let mut core = NavigationCore::new(&config).unwrap();
        let mut scanner = scanner_for(&config);
        scanner.set_robot_position(3.1, 4.2);

        let report = core.localize(&mut scanner);
        assert_eq!(report.kind, FixKind::LeastSquares);
        assert_relative_eq!(report.position.x, 3.1, epsilon = 1e-6);
        assert_relative_eq!(report.position.y, 4.2, epsilon = 1e-6);
        assert!(report.position.confidence > 0.9);
        assert_eq!(core.robot_cell(), Some(GridCoord::new(6, 8)));
    }

    #[test]
    fn test_scan_failure_keeps_last_position() {
        let config = test_config();
        let mut core = NavigationCore::new(&config).unwrap();
        let mut scanner = scanner_for(&config);
        scanner.set_robot_position(3.0, 4.0);
        core.localize(&mut scanner);

        scanner.fail_next(1);
        let report = core.localize(&mut scanner);

        assert_eq!(report.kind, FixKind::Insufficient);
        assert_eq!(report.position.confidence, 0.0);
        assert_relative_eq!(report.position.x, 3.0, epsilon = 1e-6);
        assert_eq!(core.robot_cell(), None);
    }

    #[test]
    fn test_default_workspace_is_grid_extent() {
        let config = test_config();
        let mut core = NavigationCore::new(&config).unwrap();
        let mut scanner = scanner_for(&config);
        // Outside the 10x10 area but still within sensing range
        scanner.set_robot_position(11.0, 3.0);

        let report = core.localize(&mut scanner);
        assert_relative_eq!(report.position.x, 11.0, epsilon = 1e-6);
        assert!(report.position.confidence <= 0.5);
        assert!(report.position.confidence > 0.4);
    }

    #[test]
    fn test_callback_scanner_routing() {
        let config = test_config();
        let mut core = NavigationCore::new(&config).unwrap();
        let mut scanner = CallbackScanner::new();
        let mut on_advertisement = scanner.sink().into_callback();

        let model = config.path_loss;
        on_advertisement(1, model.rssi_at(5.0));
        on_advertisement(2, model.rssi_at(65f64.sqrt()));
        on_advertisement(3, model.rssi_at(45f64.sqrt()));

        let position = core.localize(&mut scanner).position;
        assert_relative_eq!(position.x, 3.0, epsilon = 1e-6);
        assert_relative_eq!(position.y, 4.0, epsilon = 1e-6);

        // Nothing delivered since the last tick
        assert_eq!(core.localize(&mut scanner).kind, FixKind::Insufficient);
    }

    #[test]
    fn test_observers_follow_grid_changes() {
        let mut core = NavigationCore::new(&test_config()).unwrap();
        let observer = RecordingObserver::new();
        let handle = core.add_observer(Box::new(observer.clone()));

        assert!(core.set_obstacle(GridCoord::new(1, 1), true));
        assert!(!core.set_obstacle(GridCoord::new(1, 1), true));
        assert_eq!(observer.revisions(), vec![1]);

        assert!(core.remove_observer(handle));
        core.set_obstacle(GridCoord::new(2, 2), true);
        assert_eq!(observer.notification_count(), 1);
        assert!(!core.remove_observer(handle));
    }

    #[test]
    fn test_explore_then_plan() {
        let mut core = walled_core(6, 4);
        let observer = RecordingObserver::new();
        core.add_observer(Box::new(observer.clone()));

        let report = core.explore_from(GridCoord::new(1, 1));
        assert!(report.closed_loop);
        assert_eq!(core.grid().count(GridCell::Unknown), 0);
        assert_eq!(observer.notification_count(), 1);

        let path = core.find_path(GridCoord::new(1, 1), GridCoord::new(4, 2));
        assert_eq!(path.first(), Some(&GridCoord::new(1, 1)));
        assert_eq!(path.last(), Some(&GridCoord::new(4, 2)));
        assert_relative_eq!(planning::path_cost(&path), 2.0 + std::f64::consts::SQRT_2, epsilon = 1e-9);

        let rows = core.traversability(false).to_rows();
        assert_eq!(rows[0], vec![1; 6]);
        assert_eq!(rows[1], vec![1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_cached_path_not_served_after_obstacle() {
        let mut core = walled_core(7, 5);
        for y in 1..4 {
            for x in 1..6 {
                core.set_obstacle(GridCoord::new(x, y), false);
            }
        }
        let (start, goal) = (GridCoord::new(1, 2), GridCoord::new(5, 2));

        let before = core.find_path(start, goal);
        assert!(before.contains(&GridCoord::new(3, 2)));

        core.set_obstacle(GridCoord::new(3, 2), true);
        let after = core.find_path(start, goal);
        assert!(!after.is_empty());
        assert!(!after.contains(&GridCoord::new(3, 2)));

        core.set_obstacle(GridCoord::new(3, 1), true);
        core.set_obstacle(GridCoord::new(3, 3), true);
        assert!(core.find_path(start, goal).is_empty());
        assert!(matches!(core.plan(start, goal), Err(PlanError::NoPath { .. })));
    }

    #[test]
    fn test_learn_and_apply() {
        let mut config = test_config();
        config.grid.width = 5;
        config.grid.height = 5;
        config.grid.cell_size = 0.4;
        let mut core = NavigationCore::new(&config).unwrap();

        let mut truth = OccupancyGrid::filled(5, 5, 0.4, GridCell::Free);
        truth.set_obstacle(GridCoord::new(2, 2), true);
        let mut sensor = MockRangeSensor::new(truth, 2.0);

        core.learn(&mut sensor);
        assert_eq!(core.grid().count(GridCell::Unknown), 25);

        assert_eq!(core.apply_learned_map(), 25);
        assert!(core.grid().is_wall(GridCoord::new(2, 2)));
        let detour = core.find_path(GridCoord::new(2, 1), GridCoord::new(2, 3));
        assert_eq!(detour.len(), 3);
        assert!(!detour.contains(&GridCoord::new(2, 2)));

        core.clear_learned_map();
        assert_eq!(core.apply_learned_map(), 1);
        assert!(core.grid().is_free(GridCoord::new(2, 2)));
    }

    #[test]
    fn test_path_lengths_to_beacons() {
        let mut config = test_config();
        config.beacons.push(BeaconConfig { id: 4, x: 2.2, y: 0.2 });
        config.beacons.push(BeaconConfig { id: 9, x: 50.0, y: 50.0 });
        let mut core = NavigationCore::new(&config).unwrap();
        for y in 0..20 {
            for x in 0..20 {
                core.set_obstacle(GridCoord::new(x, y), false);
            }
        }

        let lengths = core.path_lengths_to_beacons(GridCoord::new(0, 0));
        // Beacons on the far edges sit just outside the grid
        assert_eq!(lengths, vec![(1, Some(0)), (2, None), (3, None), (4, Some(4)), (9, None)]);
    }
}
