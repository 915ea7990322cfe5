//! Clearance map: grid-step distance from every cell to the nearest obstacle.
//!
//! Built once per grid with a multi-source Brushfire (BFS) seeded at every
//! occupied cell and expanded 4-connected, which yields the exact city-block
//! distance field in time linear in the cell count.

use crate::core::GridCoord;
use crate::grid::OccupancyGrid;
use std::collections::VecDeque;
use tracing::debug;

/// Clearance of a free cell that no obstacle can reach (obstacle-free grid).
pub const UNBOUNDED: u32 = u32::MAX;

/// Distance-to-nearest-obstacle field over an occupancy grid.
#[derive(Clone, Debug, PartialEq)]
pub struct ClearanceMap {
    width: usize,
    height: usize,
    /// Clearance in cells; 0 for occupied cells
    values: Vec<u32>,
    /// Maximum finite clearance over all free cells
    max_clearance: u32,
}

impl ClearanceMap {
    /// Build the clearance map for a grid.
    pub fn build(grid: &OccupancyGrid) -> Self {
        let width = grid.width();
        let height = grid.height();
        let mut values = vec![UNBOUNDED; width * height];
        let mut queue = VecDeque::with_capacity(grid.occupied_count());

        for coord in grid.occupied_cells() {
            if let Some(idx) = grid.coord_to_index(coord) {
                values[idx] = 0;
                queue.push_back(coord);
            }
        }

        let mut max_clearance = 0;

        while let Some(coord) = queue.pop_front() {
            let Some(idx) = grid.coord_to_index(coord) else {
                continue;
            };
            let next = values[idx] + 1;

            for neighbor in coord.neighbors_4() {
                let Some(n_idx) = grid.coord_to_index(neighbor) else {
                    continue;
                };
                // First visit is the shortest in BFS order
                if values[n_idx] == UNBOUNDED {
                    values[n_idx] = next;
                    max_clearance = max_clearance.max(next);
                    queue.push_back(neighbor);
                }
            }
        }

        debug!(
            "[Clearance] built {}x{} map, {} obstacles, max_clearance={}",
            width,
            height,
            grid.occupied_count(),
            max_clearance
        );

        Self {
            width,
            height,
            values,
            max_clearance,
        }
    }

    /// Grid width in cells
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Maximum clearance over all free cells (0 if no obstacle reaches any free cell)
    #[inline]
    pub fn max_clearance(&self) -> u32 {
        self.max_clearance
    }

    /// Clearance at a cell, `None` if out of bounds.
    #[inline]
    pub fn get(&self, coord: GridCoord) -> Option<u32> {
        if coord.x < 0
            || coord.y < 0
            || coord.x as usize >= self.width
            || coord.y as usize >= self.height
        {
            return None;
        }
        Some(self.values[coord.y as usize * self.width + coord.x as usize])
    }

    /// Raw row-major clearance values
    #[inline]
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Normalized wall proximity in [0, 1]: 1 next to a wall, 0 at `max_clearance`.
    ///
    /// Returns 0 when `max_clearance == 0` so the planner degrades to unit cost.
    #[inline]
    pub fn proximity(&self, coord: GridCoord) -> f32 {
        if self.max_clearance == 0 {
            return 0.0;
        }
        let c = self.get(coord).unwrap_or(0).min(self.max_clearance);
        (self.max_clearance - c) as f32 / self.max_clearance as f32
    }
}
