//! Beacon signal conditioning and observation gating.

mod aggregator;
mod conditioner;

pub use aggregator::ObservationAggregator;
pub use conditioner::{BeaconFilter, SignalConditioner};
