use log::{debug, info, warn};
use scv_nav::core::{GridCell, GridCoord};
use scv_nav::hardware::{MockBeaconScanner, MockRangeSensor};
use scv_nav::mapping::OccupancyGrid;
use scv_nav::planning::{count_turns, path_cost};
use scv_nav::utils::config::{BeaconConfig, NavConfig};
use scv_nav::NavigationCore;

/// Simulated robot position in world units
const ROBOT_START: (f64, f64) = (1.3, 1.2);

fn demo_config() -> NavConfig {
    let mut config = NavConfig::default();
    config.grid.width = 20;
    config.grid.height = 12;
    config.grid.cell_size = 0.5;
    config.beacons = vec![
        BeaconConfig { id: 1, x: 0.25, y: 0.25 },
        BeaconConfig { id: 2, x: 9.75, y: 0.25 },
        BeaconConfig { id: 3, x: 0.25, y: 5.75 },
        BeaconConfig { id: 4, x: 9.75, y: 5.75 },
    ];
    config
}

/// Ground-truth room: outer walls plus a partition with a doorway
fn build_room(config: &NavConfig) -> OccupancyGrid {
    let (width, height) = (config.grid.width as i32, config.grid.height as i32);
    let mut room = OccupancyGrid::filled(config.grid.width, config.grid.height, config.grid.cell_size, GridCell::Free);

    for x in 0..width {
        room.set_obstacle(GridCoord::new(x, 0), true);
        room.set_obstacle(GridCoord::new(x, height - 1), true);
    }
    for y in 0..height {
        room.set_obstacle(GridCoord::new(0, y), true);
        room.set_obstacle(GridCoord::new(width - 1, y), true);
    }

    let partition = width / 2;
    for y in 0..height - 3 {
        room.set_obstacle(GridCoord::new(partition, y), true);
    }
    room
}

fn run(config: NavConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut core = NavigationCore::new(&config)?;
    let room = build_room(&config);

    // Map learning
    let mut ranger = MockRangeSensor::new(room.clone(), 4.0 * config.grid.cell_size);
    core.learn(&mut ranger);
    let changed = core.apply_learned_map();
    info!("learned map applied ({} cells changed)", changed);

    // Localization
    let mut scanner = config
        .beacons
        .iter()
        .fold(MockBeaconScanner::new(1, config.path_loss), |scanner, beacon| {
            scanner.with_beacon(beacon.id, beacon.x, beacon.y)
        });
    scanner.set_robot_position(ROBOT_START.0, ROBOT_START.1);
    let report = core.localize(&mut scanner);
    info!(
        "position ({:.2}, {:.2}) confidence {:.2} via {:?}",
        report.position.x, report.position.y, report.position.confidence, report.kind
    );

    let Some(start) = core.robot_cell() else {
        warn!("no trusted position, skipping planning");
        return Ok(());
    };

    // Exploration confirms the reachable area around the robot
    let exploration = core.explore_from(start);
    info!(
        "exploration: {} moves, closed loop: {}, {} cells visited",
        exploration.moves,
        exploration.closed_loop,
        exploration.visited.len()
    );

    // Planning into the far room
    let goal = GridCoord::new(config.grid.width as i32 - 2, 1);
    let path = core.find_path(start, goal);
    if path.is_empty() {
        match core.plan(start, goal) {
            Err(reason) => warn!("no path from {} to {}: {}", start, goal, reason),
            Ok(_) => warn!("no path from {} to {}", start, goal),
        }
        return Ok(());
    }

    let waypoints = core.optimize_path(&path);
    info!(
        "path {} -> {}: {} cells, cost {:.2}, {} turns, {} waypoints after optimization",
        start,
        goal,
        path.len(),
        path_cost(&path),
        count_turns(&path),
        waypoints.len()
    );
    debug!("\n{}", core.render_path(&path));

    for (id, length) in core.path_lengths_to_beacons(start) {
        match length {
            Some(moves) => info!("beacon {}: {} moves", id, moves),
            None => info!("beacon {}: unreachable", id),
        }
    }

    let stats = core.cache_statistics();
    info!(
        "path cache: {} hits, {} misses, {:.0}% hit rate",
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );

    println!("{}", core.render_path(&path));
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("scv_nav", |s| s.as_str());

    if args.len() == 3 && args[1] == "--write-default-config" {
        demo_config().to_file(&args[2])?;
        info!("wrote default configuration to {}", args[2]);
        return Ok(());
    }

    let config = match args.len() {
        1 => demo_config(),
        2 => NavConfig::from_file(&args[1])?,
        _ => {
            eprintln!("Usage: {} [config.json]", program);
            eprintln!("   or: {} --write-default-config <path>", program);
            return Err("Invalid arguments".into());
        }
    };

    run(config)
}
