//! Inputs to and outputs from the navigation core.

use crate::core::WorldPoint;
use crate::fingerprint::BeaconId;
use crate::planning::PathFailure;
use serde::{Deserialize, Serialize};

/// Where to navigate: a configured name or a raw metric point
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DestinationTarget {
    Named { name: String },
    Point { x: f32, y: f32 },
}

/// Event from one of the asynchronous producers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorEvent {
    /// Raw signal strength from one beacon (dBm)
    Beacon { id: BeaconId, rssi: f32 },
    /// Inertial heading in degrees
    Heading { degrees: f32 },
    /// Inertial speed in m/s
    Speed { speed: f32 },
    /// Select a destination
    Destination { target: DestinationTarget },
    /// Stop navigating
    ClearDestination,
}

/// Output published after each state change
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationUpdate {
    /// Fused position and display heading
    Pose {
        position: WorldPoint,
        heading_deg: f32,
    },
    /// Waypoints (cell centers) from the current position to the destination
    Route { waypoints: Vec<WorldPoint> },
    /// The last re-plan found no route
    NoRoute { reason: PathFailure },
    /// The destination was reached and cleared
    Arrived { destination: WorldPoint },
}
