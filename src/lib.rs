//! # Marga: Indoor Beacon Navigation
//!
//! Locates a walker on a known floor plan from Bluetooth beacon signal
//! strengths, fuses those fixes with inertial dead reckoning, and plans a
//! wall-avoiding route to a destination.
//!
//! ## Data Flow
//!
//! ```text
//!   beacon RSSI ──► SignalConditioner ──► ObservationAggregator
//!                                                │ ≥ min_beacons
//!                                                ▼
//!                                        Locator (k-NN / classifier)
//!                                                │ position fix
//!   heading, speed ─────────────────────► PositionEkf ◄── WallAvoidance
//!                                                │ fused position
//!                                                ▼
//!                         ClearanceMap ──► AStarPlanner ──► route
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Coordinate types and heading helpers
//! - [`grid`]: Occupancy grid and its file formats
//! - [`planning`]: Clearance map, A* and the replan policy
//! - [`signal`]: Per-beacon RSSI filtering and observation gating
//! - [`fingerprint`]: Calibration database and locator strategies
//! - [`estimation`]: Fusion EKF and the wall-avoidance corrector
//! - [`navigation`]: The serialized navigation core
//! - [`threads`]: Runtime threads around the core
//! - [`io`]: Recorded event logs
//!
//! ## Coordinate Frame
//!
//! World coordinates are meters with the grid origin at the corner of cell
//! (0, 0). Grid columns grow with x and rows grow with y. Floor plans are
//! screen-oriented (y grows downward), and headings are degrees measured
//! from +x toward +y.

pub mod config;
pub mod core;
pub mod error;
pub mod estimation;
pub mod fingerprint;
pub mod grid;
pub mod io;
pub mod navigation;
pub mod planning;
pub mod signal;
pub mod threads;

pub use config::MargaConfig;
pub use core::{Direction, GridCoord, WorldPoint};
pub use error::{MargaError, Result};
pub use estimation::{EstimatorState, PositionEkf, WallAvoidance};
pub use fingerprint::{
    BeaconId, CellClassifier, FingerprintDatabase, KnnLocator, LocateResult, Locator,
    SignalVector, locator_from_config,
};
pub use grid::OccupancyGrid;
pub use navigation::{DestinationTarget, NavigationUpdate, Navigator, SensorEvent};
pub use planning::{AStarConfig, AStarPlanner, ClearanceMap, PathFailure, PathResult};
pub use signal::{ObservationAggregator, SignalConditioner};
pub use threads::{RuntimeHandles, spawn_runtime};
