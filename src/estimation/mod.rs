//! State estimation: the fusion EKF and the wall-avoidance corrector.

mod ekf;
mod wall_avoidance;

pub use ekf::{EstimatorState, PositionEkf, UpdateOutcome};
pub use wall_avoidance::{Correction, WallAvoidance};
