//! Clearance map and clearance-weighted route planning.
//!
//! - [`ClearanceMap`]: Brushfire distance-to-obstacle field, built once per grid
//! - [`AStarPlanner`]: 4-connected A* that prefers high-clearance cells
//! - [`RouteTracker`]: decides when the live route must be recomputed

mod astar;
mod clearance;
mod route;
mod types;

pub use astar::AStarPlanner;
pub use clearance::{ClearanceMap, UNBOUNDED};
pub use route::RouteTracker;
pub use types::{AStarConfig, PathFailure, PathResult};
