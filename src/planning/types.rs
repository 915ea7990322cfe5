//! Search node, planner settings and route results.

use crate::core::{GridCoord, WorldPoint};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Open-set entry
#[derive(Clone, Debug)]
pub(super) struct AStarNode {
    pub coord: GridCoord,
    pub g_cost: f32,
    pub h_cost: f32,
    pub f_cost: f32,
}

/// Min-heap ordering by `(f, h)`, used only inside the open set.
///
/// Equality follows the ordering so the heap stays consistent; cell identity
/// is tracked by the planner's per-cell arrays.
impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior
        other
            .f_cost
            .total_cmp(&self.f_cost)
            .then_with(|| other.h_cost.total_cmp(&self.h_cost))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for AStarNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AStarNode {}

/// Route planner settings
#[derive(Clone, Debug, PartialEq)]
pub struct AStarConfig {
    /// Weight of the wall-proximity term in the step cost (0 = plain shortest path)
    pub penalty_strength: f32,
}

impl Default for AStarConfig {
    fn default() -> Self {
        Self {
            penalty_strength: 2.5,
        }
    }
}

impl AStarConfig {
    /// Configuration with the given clearance penalty
    pub fn with_penalty(penalty_strength: f32) -> Self {
        Self { penalty_strength }
    }
}

/// Outcome of one route search
#[derive(Clone, Debug)]
pub struct PathResult {
    /// Path as grid coordinates, start and goal inclusive (empty if no path found)
    pub path_grid: Vec<GridCoord>,
    /// Path as world coordinates (cell centers)
    pub path_world: Vec<WorldPoint>,
    /// Total path cost
    pub cost: f32,
    /// Cells popped and expanded
    pub nodes_expanded: usize,
    /// Whether a path was found
    pub success: bool,
    /// Set exactly when `success` is false
    pub failure_reason: Option<PathFailure>,
}

impl PathResult {
    /// Empty route with infinite cost
    pub(super) fn failed(reason: PathFailure, nodes_expanded: usize) -> Self {
        Self {
            path_grid: Vec::new(),
            path_world: Vec::new(),
            cost: f32::INFINITY,
            nodes_expanded,
            success: false,
            failure_reason: Some(reason),
        }
    }

    /// Path length in cells
    pub fn length_cells(&self) -> usize {
        self.path_grid.len()
    }

    /// Walking distance along the cell centers
    pub fn length_meters(&self) -> f32 {
        self.path_world
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum()
    }
}

/// Why a route search came back empty
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathFailure {
    /// Start cell is occupied
    StartBlocked,
    /// Goal cell is occupied
    GoalBlocked,
    /// Goal is walled off from the start
    NoPath,
    /// Start or goal lies off the plan
    OutOfBounds,
}

impl std::fmt::Display for PathFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PathFailure::StartBlocked => "start blocked",
            PathFailure::GoalBlocked => "goal blocked",
            PathFailure::NoPath => "no path",
            PathFailure::OutOfBounds => "out of bounds",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn node(x: i32, f: f32, h: f32) -> AStarNode {
        AStarNode {
            coord: GridCoord::new(x, 0),
            g_cost: f - h,
            h_cost: h,
            f_cost: f,
        }
    }

    #[test]
    fn test_heap_orders_by_f_then_h() {
        let mut heap = BinaryHeap::new();
        heap.push(node(0, 5.0, 1.0));
        heap.push(node(1, 4.0, 3.0));
        heap.push(node(2, 4.0, 2.0));
        heap.push(node(3, 6.0, 0.0));

        let order: Vec<i32> = std::iter::from_fn(|| heap.pop().map(|n| n.coord.x)).collect();
        assert_eq!(order, vec![2, 1, 0, 3]);
    }

    #[test]
    fn test_length_meters() {
        let result = PathResult {
            path_grid: vec![GridCoord::new(0, 0), GridCoord::new(1, 0), GridCoord::new(1, 1)],
            path_world: vec![
                WorldPoint::new(0.5, 0.5),
                WorldPoint::new(1.5, 0.5),
                WorldPoint::new(1.5, 1.5),
            ],
            cost: 2.0,
            nodes_expanded: 3,
            success: true,
            failure_reason: None,
        };
        assert!((result.length_meters() - 2.0).abs() < 1e-6);
        assert_eq!(result.length_cells(), 3);
    }
}
