//! Heading helpers and the coarse compass quadrant used as a locator feature.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalize angle to [-π, π]
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % std::f32::consts::TAU;
    if a > std::f32::consts::PI {
        a -= std::f32::consts::TAU;
    } else if a < -std::f32::consts::PI {
        a += std::f32::consts::TAU;
    }
    a
}

/// Normalize a heading in degrees to [0, 360)
#[inline]
pub fn normalize_degrees(deg: f32) -> f32 {
    let d = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if d >= 360.0 { 0.0 } else { d }
}

/// Coarse compass quadrant of the current heading.
///
/// Floor plans are screen-oriented (y grows downward), so a heading of
/// 90° points "south" on the plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    N,
    E,
    S,
    W,
}

impl Direction {
    /// All quadrants in one-hot feature order.
    pub const ALL: [Direction; 4] = [Direction::E, Direction::N, Direction::S, Direction::W];

    /// Quadrant for a heading in degrees.
    pub fn from_heading_deg(heading_deg: f32) -> Self {
        let h = normalize_degrees(heading_deg);
        if (45.0..135.0).contains(&h) {
            Direction::S
        } else if (135.0..225.0).contains(&h) {
            Direction::W
        } else if (225.0..315.0).contains(&h) {
            Direction::N
        } else {
            Direction::E
        }
    }

    /// Index of this quadrant in [`Direction::ALL`].
    pub fn feature_index(self) -> usize {
        match self {
            Direction::E => 0,
            Direction::N => 1,
            Direction::S => 2,
            Direction::W => 3,
        }
    }

    /// One-hot encoding in [`Direction::ALL`] order.
    pub fn one_hot(self) -> [f32; 4] {
        let mut v = [0.0; 4];
        v[self.feature_index()] = 1.0;
        v
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::N => "N",
            Direction::E => "E",
            Direction::S => "S",
            Direction::W => "W",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-5);
        assert!((normalize_angle(-3.0 * PI) + PI).abs() < 1e-5);
        assert!((normalize_angle(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(370.0), 10.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(0.0), 0.0);
    }

    #[test]
    fn test_direction_quadrants() {
        assert_eq!(Direction::from_heading_deg(0.0), Direction::E);
        assert_eq!(Direction::from_heading_deg(44.9), Direction::E);
        assert_eq!(Direction::from_heading_deg(45.0), Direction::S);
        assert_eq!(Direction::from_heading_deg(90.0), Direction::S);
        assert_eq!(Direction::from_heading_deg(135.0), Direction::W);
        assert_eq!(Direction::from_heading_deg(224.0), Direction::W);
        assert_eq!(Direction::from_heading_deg(225.0), Direction::N);
        assert_eq!(Direction::from_heading_deg(314.0), Direction::N);
        assert_eq!(Direction::from_heading_deg(315.0), Direction::E);
        assert_eq!(Direction::from_heading_deg(-90.0), Direction::N);
    }

    #[test]
    fn test_one_hot() {
        assert_eq!(Direction::W.one_hot(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(Direction::E.one_hot(), [1.0, 0.0, 0.0, 0.0]);
    }
}
