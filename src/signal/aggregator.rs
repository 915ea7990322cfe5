//! Rolling merge of asynchronous beacon readings into one observation.

use crate::fingerprint::{BeaconId, SignalVector};
use tracing::trace;

/// Latest conditioned value per beacon over the current flush window.
///
/// A snapshot becomes available once enough distinct beacons have been
/// heard; the window is emptied by [`ObservationAggregator::flush`].
#[derive(Clone, Debug)]
pub struct ObservationAggregator {
    readings: SignalVector,
    min_beacons: usize,
}

impl ObservationAggregator {
    pub fn new(min_beacons: usize) -> Self {
        Self {
            readings: SignalVector::new(),
            min_beacons,
        }
    }

    /// Merge one reading; returns a snapshot if the gate is open.
    pub fn insert(&mut self, id: BeaconId, value: f32) -> Option<SignalVector> {
        self.readings.insert(id, value);
        trace!(
            "[Aggregator] {} / {} beacons",
            self.readings.len(),
            self.min_beacons
        );
        self.snapshot()
    }

    /// Copy of the aggregate if it holds at least `min_beacons` ids.
    pub fn snapshot(&self) -> Option<SignalVector> {
        if self.readings.len() >= self.min_beacons {
            Some(self.readings.clone())
        } else {
            None
        }
    }

    /// Drop all readings. Returns how many beacons were held.
    pub fn flush(&mut self) -> usize {
        let n = self.readings.len();
        self.readings.clear();
        n
    }

    /// Number of distinct beacons in the current window
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
