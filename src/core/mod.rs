//! Core types shared by every other module:
//! - [`GridCoord`] and [`WorldPoint`]: Coordinate types
//! - [`Direction`]: Compass quadrant derived from heading

mod heading;
mod point;

pub use heading::{Direction, normalize_angle, normalize_degrees};
pub use point::{GridCoord, WorldPoint};
