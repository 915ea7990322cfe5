//! Wall-avoidance corrector.
//!
//! Fingerprint fixes near walls are sparse and noisy, so the fused estimate
//! can drift into low-clearance cells. On each tick, if the estimate sits in
//! a cell whose clearance is below the threshold, it is pulled part of the way
//! toward that cell's center and its position uncertainty is inflated.

use crate::config::CorrectionConfig;
use crate::core::{GridCoord, WorldPoint};
use crate::grid::OccupancyGrid;
use crate::planning::ClearanceMap;
use tracing::{debug, warn};

use super::ekf::PositionEkf;

/// A correction that was applied
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correction {
    /// Cell the estimate was in
    pub cell: GridCoord,
    /// Clearance of that cell
    pub clearance: u32,
    /// Offset added to the position
    pub delta: WorldPoint,
}

/// Periodic centering heuristic.
#[derive(Clone, Debug)]
pub struct WallAvoidance {
    config: CorrectionConfig,
}

impl WallAvoidance {
    pub fn new(config: CorrectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Correction the estimator at `position` would receive, if any.
    pub fn evaluate(
        &self,
        position: WorldPoint,
        grid: &OccupancyGrid,
        clearance: &ClearanceMap,
    ) -> Option<Correction> {
        let cell = grid.world_to_grid(position);
        let Some(c) = clearance.get(cell) else {
            warn!(
                "[WallAvoidance] estimate ({:.2},{:.2}) is off the map",
                position.x, position.y
            );
            return None;
        };

        if c >= self.config.clearance_threshold {
            return None;
        }

        let center = grid.grid_to_world(cell);
        Some(Correction {
            cell,
            clearance: c,
            delta: (center - position) * self.config.centering_strength,
        })
    }

    /// Check the estimator and apply a correction if needed.
    pub fn apply(
        &self,
        ekf: &mut PositionEkf,
        grid: &OccupancyGrid,
        clearance: &ClearanceMap,
    ) -> Option<Correction> {
        if !self.config.enabled {
            return None;
        }
        let correction = self.evaluate(ekf.position(), grid, clearance)?;
        ekf.shift_position(correction.delta, self.config.covariance_inflation);

        debug!(
            "[WallAvoidance] cell ({},{}) clearance={} shifted by ({:.2},{:.2})",
            correction.cell.x,
            correction.cell.y,
            correction.clearance,
            correction.delta.x,
            correction.delta.y
        );
        Some(correction)
    }
}
