//! Beacon identifiers, signal vectors and calibration samples.

use crate::core::{Direction, WorldPoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque, canonical beacon identifier (e.g. a MAC address).
///
/// Stored and persisted exactly as received.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeaconId(String);

impl BeaconId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BeaconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BeaconId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Signal strength per beacon, ordered by id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalVector(BTreeMap<BeaconId, f32>);

impl SignalVector {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or overwrite a reading
    pub fn insert(&mut self, id: BeaconId, value: f32) {
        self.0.insert(id, value);
    }

    pub fn get(&self, id: &BeaconId) -> Option<f32> {
        self.0.get(id).copied()
    }

    pub fn contains(&self, id: &BeaconId) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn ids(&self) -> impl Iterator<Item = &BeaconId> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BeaconId, f32)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }
}

impl FromIterator<(BeaconId, f32)> for SignalVector {
    fn from_iter<I: IntoIterator<Item = (BeaconId, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One calibration record: where it was taken and what was heard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FingerprintSample {
    /// Metric position of the calibration point
    pub position: WorldPoint,
    /// Facing direction while the sample was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    /// Conditioned signal strength per beacon
    pub signals: SignalVector,
}

impl FingerprintSample {
    pub fn new(position: WorldPoint, direction: Option<Direction>, signals: SignalVector) -> Self {
        Self {
            position,
            direction,
            signals,
        }
    }
}

/// Outcome of a locator query.
#[derive(Clone, Debug, PartialEq)]
pub struct LocateResult {
    /// Position estimate
    pub position: WorldPoint,
    /// Best-matching positions, nearest first
    pub candidates: Vec<WorldPoint>,
    /// Signal-space distance of each candidate
    pub distances: Vec<f32>,
}
