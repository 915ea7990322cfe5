//! Clearance-weighted A* planner.
//!
//! 4-connected search where entering cell `c` costs
//! `1 + penalty_strength * (max_clearance - clearance[c]) / max_clearance`.
//! Every step costs at least 1, so the Manhattan heuristic stays admissible
//! and consistent.

use crate::core::{GridCoord, WorldPoint};
use crate::grid::OccupancyGrid;
use std::collections::BinaryHeap;
use tracing::{debug, trace};

use super::clearance::ClearanceMap;
use super::types::{AStarConfig, AStarNode, PathFailure, PathResult};

/// Route search over a static floor plan and its clearance map
pub struct AStarPlanner<'a> {
    grid: &'a OccupancyGrid,
    clearance: &'a ClearanceMap,
    config: AStarConfig,
}

/// Per-cell search bookkeeping, indexed by row-major cell offset
struct SearchState {
    g: Vec<f32>,
    parent: Vec<Option<usize>>,
    closed: Vec<bool>,
}

impl SearchState {
    fn new(cells: usize) -> Self {
        Self {
            g: vec![f32::INFINITY; cells],
            parent: vec![None; cells],
            closed: vec![false; cells],
        }
    }
}

impl<'a> AStarPlanner<'a> {
    pub fn new(grid: &'a OccupancyGrid, clearance: &'a ClearanceMap, config: AStarConfig) -> Self {
        Self {
            grid,
            clearance,
            config,
        }
    }

    /// Planner with the default clearance penalty
    pub fn with_defaults(grid: &'a OccupancyGrid, clearance: &'a ClearanceMap) -> Self {
        Self::new(grid, clearance, AStarConfig::default())
    }

    /// Cheapest 4-connected route between two cells, endpoints included.
    ///
    /// Failures are reported in the result, checked in the order
    /// off-plan, blocked start, blocked goal, unreachable.
    pub fn find_path(&self, start: GridCoord, goal: GridCoord) -> PathResult {
        trace!(
            "[route] search ({},{}) -> ({},{})",
            start.x, start.y, goal.x, goal.y
        );

        let (Some(start_idx), Some(goal_idx)) = (
            self.grid.coord_to_index(start),
            self.grid.coord_to_index(goal),
        ) else {
            debug!("[route] endpoint off the plan");
            return PathResult::failed(PathFailure::OutOfBounds, 0);
        };
        if self.grid.is_occupied(start) {
            debug!("[route] start ({},{}) is inside an obstacle", start.x, start.y);
            return PathResult::failed(PathFailure::StartBlocked, 0);
        }
        if self.grid.is_occupied(goal) {
            debug!("[route] goal ({},{}) is inside an obstacle", goal.x, goal.y);
            return PathResult::failed(PathFailure::GoalBlocked, 0);
        }

        let mut state = SearchState::new(self.grid.cells().len());
        let mut open = BinaryHeap::new();

        let h0 = heuristic(start, goal);
        state.g[start_idx] = 0.0;
        open.push(AStarNode {
            coord: start,
            g_cost: 0.0,
            h_cost: h0,
            f_cost: h0,
        });

        let mut expanded = 0;
        while let Some(node) = open.pop() {
            let Some(idx) = self.grid.coord_to_index(node.coord) else {
                continue;
            };
            // Closed, or a stale entry superseded by a cheaper push
            if state.closed[idx] || node.g_cost > state.g[idx] {
                continue;
            }
            expanded += 1;

            if idx == goal_idx {
                return self.build_result(&state, goal_idx, node.g_cost, expanded);
            }
            state.closed[idx] = true;

            for next in node.coord.neighbors_4() {
                if !self.grid.is_free(next) {
                    continue;
                }
                let Some(next_idx) = self.grid.coord_to_index(next) else {
                    continue;
                };
                if state.closed[next_idx] {
                    continue;
                }

                let g = node.g_cost + self.step_cost(next);
                if g < state.g[next_idx] {
                    state.g[next_idx] = g;
                    state.parent[next_idx] = Some(idx);
                    let h = heuristic(next, goal);
                    open.push(AStarNode {
                        coord: next,
                        g_cost: g,
                        h_cost: h,
                        f_cost: g + h,
                    });
                }
            }
        }

        debug!("[route] goal unreachable, {} cells expanded", expanded);
        PathResult::failed(PathFailure::NoPath, expanded)
    }

    /// Same search with floor positions snapped to their cells
    pub fn find_path_world(&self, start: WorldPoint, goal: WorldPoint) -> PathResult {
        self.find_path(self.grid.world_to_grid(start), self.grid.world_to_grid(goal))
    }

    #[inline]
    fn step_cost(&self, cell: GridCoord) -> f32 {
        if self.config.penalty_strength <= 0.0 {
            return 1.0;
        }
        1.0 + self.config.penalty_strength * self.clearance.proximity(cell)
    }

    fn build_result(
        &self,
        state: &SearchState,
        goal_idx: usize,
        cost: f32,
        nodes_expanded: usize,
    ) -> PathResult {
        let mut path_grid: Vec<GridCoord> =
            std::iter::successors(Some(goal_idx), |&i| state.parent[i])
                .map(|i| self.grid.index_to_coord(i))
                .collect();
        path_grid.reverse();

        let path_world = path_grid
            .iter()
            .map(|&c| self.grid.grid_to_world(c))
            .collect();

        trace!(
            "[route] found {} cells, cost {:.2}, {} expanded",
            path_grid.len(),
            cost,
            nodes_expanded
        );

        PathResult {
            path_grid,
            path_world,
            cost,
            nodes_expanded,
            success: true,
            failure_reason: None,
        }
    }
}

#[inline]
fn heuristic(from: GridCoord, to: GridCoord) -> f32 {
    from.manhattan_distance(&to) as f32
}
