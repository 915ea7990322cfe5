//! Cell and floor coordinates.
//!
//! Floor plans are screen-oriented: row 0 is the top line of the plan and
//! `y` grows downward, in cells and in meters alike.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Cell on the floor grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridCoord {
    /// Column
    pub x: i32,
    /// Row, counted from the top of the plan
    pub y: i32,
}

impl GridCoord {
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// City-block distance in cells
    #[inline]
    pub fn manhattan_distance(&self, other: &GridCoord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Edge-adjacent cells: below, right, above, left.
    ///
    /// Search order is part of the planner's tie-breaking, keep it stable.
    #[inline]
    pub fn neighbors_4(&self) -> [GridCoord; 4] {
        let Self { x, y } = *self;
        [
            GridCoord::new(x, y + 1),
            GridCoord::new(x + 1, y),
            GridCoord::new(x, y - 1),
            GridCoord::new(x - 1, y),
        ]
    }
}

/// Position on the floor in meters
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f32,
    pub y: f32,
}

impl WorldPoint {
    pub const ZERO: WorldPoint = WorldPoint { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Straight-line distance in meters
    #[inline]
    pub fn distance(&self, other: &WorldPoint) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Ordered `(x, y)` pair published to position consumers
    #[inline]
    pub fn as_pair(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

impl Add for WorldPoint {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for WorldPoint {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for WorldPoint {
    type Output = Self;

    #[inline]
    fn mul(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k)
    }
}
