//! Marga - indoor beacon navigation runtime
//!
//! Loads the floor plan and the fingerprint database, starts the fusion and
//! timer threads, then feeds them producer events from a recorded log (or
//! live JSON lines on stdin) and logs every navigation update.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use marga::fingerprint::{FingerprintDatabase, locator_from_config};
use marga::grid::load_grid_file;
use marga::io::EventLog;
use marga::{
    DestinationTarget, MargaConfig, MargaError, NavigationUpdate, Navigator, Result, SensorEvent,
    WorldPoint, spawn_runtime,
};

#[derive(Parser, Debug)]
#[command(name = "marga", version, about = "Indoor beacon navigation")]
struct Args {
    /// Configuration file (defaults are used when absent)
    #[arg(short, long, default_value = "marga.toml")]
    config: PathBuf,

    /// Recorded event log (JSON lines). Reads live events from stdin when omitted.
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Pace the replay at recorded timing
    #[arg(long)]
    realtime: bool,

    /// Destination name from the config, or "x,y" in meters
    #[arg(short, long)]
    destination: Option<String>,
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("marga=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    info!("Marga v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    let origin = WorldPoint::new(config.map.origin[0], config.map.origin[1]);
    let grid_path = Path::new(&config.map.grid_path);
    info!("Loading floor plan from {}", grid_path.display());
    let grid = load_grid_file(grid_path, config.map.resolution, origin)?;

    let db_path = Path::new(&config.map.fingerprint_db_path);
    info!("Loading fingerprint database from {}", db_path.display());
    let db = FingerprintDatabase::load(db_path, config.locator.required_samples)?;
    info!(
        "Fingerprint database: {} samples at {} positions, {} beacons",
        db.len(),
        db.positions().len(),
        db.beacon_ids().len()
    );
    let locator = locator_from_config(&config.locator, db)?;

    let navigator = Navigator::new(&config, grid, locator);

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handler(Arc::clone(&shutdown))?;

    let handles = spawn_runtime(&config, navigator, Arc::clone(&shutdown))?;
    let publisher = spawn_publisher(handles.updates.clone())?;

    if let Some(destination) = &args.destination {
        let target = parse_destination(destination);
        send(&handles.events, SensorEvent::Destination { target });
    }

    match &args.replay {
        Some(path) => {
            let mut log = EventLog::open(path)?;
            info!(
                "Replaying {} events ({:.1}s recorded)",
                log.len(),
                log.duration().as_secs_f32()
            );
            if args.realtime {
                log.set_speed(1.0);
            }
            for entry in log {
                if shutdown.load(Ordering::SeqCst) || !send(&handles.events, entry.event) {
                    break;
                }
            }
        }
        None => {
            info!("Reading events from stdin");
            // Detached: a blocking read must not hold up shutdown
            let reader = spawn_stdin_reader(handles.events.clone(), Arc::clone(&shutdown))?;
            while !reader.is_finished() && !shutdown.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(100));
            }
        }
    }

    // Let the fusion thread drain the queue before stopping
    while !handles.events.is_empty()
        && !handles.fusion.is_finished()
        && !shutdown.load(Ordering::SeqCst)
    {
        thread::sleep(Duration::from_millis(10));
    }

    let stats = handles.navigator.lock().stats();
    let final_state = handles.navigator.lock().state();

    info!("Waiting for threads to finish...");
    handles.join()?;
    if publisher.join().is_err() {
        error!("Publisher thread panicked");
    }

    info!(
        "Final estimate ({:.2},{:.2}) heading {:.1}°, uncertainty {:.3}",
        final_state.position.x,
        final_state.position.y,
        final_state.heading_deg(),
        final_state.uncertainty()
    );
    info!(
        "Session: {} beacon readings, {} fixes applied ({} rejected, {} locate failures), {} predictions, {} corrections, {} replans",
        stats.beacon_readings,
        stats.fixes_applied,
        stats.fixes_rejected,
        stats.locate_failures,
        stats.predictions,
        stats.corrections,
        stats.replans
    );
    Ok(())
}

/// Set `shutdown` on Ctrl-C.
fn setup_signal_handler(shutdown: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("Interrupt received, shutting down");
        shutdown.store(true, Ordering::SeqCst);
    })
    .map_err(|e| MargaError::Thread(format!("failed to install Ctrl-C handler: {}", e)))
}

fn load_config(path: &Path) -> Result<MargaConfig> {
    if path.exists() {
        info!("Loading configuration from {}", path.display());
        MargaConfig::load(path)
    } else {
        info!("Using default configuration");
        Ok(MargaConfig::default())
    }
}

/// `"x,y"` selects a raw point, anything else a named destination.
fn parse_destination(text: &str) -> DestinationTarget {
    let point = text
        .split_once(',')
        .and_then(|(x, y)| Some((x.trim().parse::<f32>().ok()?, y.trim().parse::<f32>().ok()?)));
    match point {
        Some((x, y)) => DestinationTarget::Point { x, y },
        None => DestinationTarget::Named {
            name: text.to_string(),
        },
    }
}

/// Returns false once the runtime has stopped listening.
fn send(events: &Sender<SensorEvent>, event: SensorEvent) -> bool {
    if events.send(event).is_err() {
        warn!("Runtime stopped accepting events");
        return false;
    }
    true
}

/// Forward live JSON-line events until EOF or shutdown.
fn spawn_stdin_reader(
    events: Sender<SensorEvent>,
    shutdown: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin".into())
        .spawn(move || feed_stdin(&events, &shutdown))
        .map_err(|e| MargaError::Thread(format!("failed to spawn stdin reader: {}", e)))
}

fn feed_stdin(events: &Sender<SensorEvent>, shutdown: &AtomicBool) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SensorEvent>(&line) {
            Ok(event) => {
                if !send(events, event) {
                    break;
                }
            }
            Err(e) => warn!("Skipping malformed event: {}", e),
        }
    }
}

/// Print every update as a JSON line until the runtime hangs up.
fn spawn_publisher(updates: Receiver<NavigationUpdate>) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("publisher".into())
        .spawn(move || {
            for update in updates.iter() {
                match &update {
                    NavigationUpdate::Arrived { destination } => {
                        info!("Arrived at ({:.2},{:.2})", destination.x, destination.y)
                    }
                    NavigationUpdate::NoRoute { reason } => warn!("No route: {}", reason),
                    _ => {}
                }
                match serde_json::to_string(&update) {
                    Ok(line) => println!("{}", line),
                    Err(e) => error!("Failed to encode update: {}", e),
                }
            }
        })
        .map_err(|e| MargaError::Thread(format!("failed to spawn publisher thread: {}", e)))
}
