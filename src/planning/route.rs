//! Replanning policy for the live route.

use crate::core::GridCoord;

use super::types::PathResult;

/// Tracks the last planned route and decides when a new search is needed.
///
/// A search runs when the goal cell changes, when the start cell differs
/// from the start of the last successful search, or when forced (e.g. after
/// a wall-avoidance correction).
#[derive(Clone, Debug, Default)]
pub struct RouteTracker {
    goal: Option<GridCoord>,
    last_success_start: Option<GridCoord>,
    last_good: Option<PathResult>,
}

impl RouteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current goal cell
    pub fn goal(&self) -> Option<GridCoord> {
        self.goal
    }

    /// Set a new goal. Returns true if it differs from the current one.
    pub fn set_goal(&mut self, goal: GridCoord) -> bool {
        if self.goal == Some(goal) {
            return false;
        }
        self.goal = Some(goal);
        self.last_success_start = None;
        self.last_good = None;
        true
    }

    /// Drop the goal and any stored route
    pub fn clear(&mut self) {
        self.goal = None;
        self.last_success_start = None;
        self.last_good = None;
    }

    /// Whether a search from `start` is due.
    pub fn needs_replan(&self, start: GridCoord) -> bool {
        self.goal.is_some() && self.last_success_start != Some(start)
    }

    /// Record the outcome of a search started at `start`.
    ///
    /// Failed searches keep the last good route.
    pub fn record(&mut self, start: GridCoord, result: &PathResult) {
        if result.success {
            self.last_success_start = Some(start);
            self.last_good = Some(result.clone());
        }
    }

    /// Last successful route toward the current goal
    pub fn last_good(&self) -> Option<&PathResult> {
        self.last_good.as_ref()
    }
}
