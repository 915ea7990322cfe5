//! Signal conditioning and fusion filter behavior on synthetic streams.
//!
//! Run with: `cargo test --test localization`

use approx::assert_relative_eq;
use marga::config::{EstimatorConfig, SignalConfig};
use marga::core::WorldPoint;
use marga::estimation::{PositionEkf, UpdateOutcome};
use marga::fingerprint::BeaconId;
use marga::signal::{ObservationAggregator, SignalConditioner};

// ============================================================================
// Signal conditioner
// ============================================================================

fn conditioner() -> SignalConditioner {
    SignalConditioner::new(SignalConfig::default())
}

#[test]
fn test_constant_stream_is_reproduced() {
    let mut c = conditioner();
    let id = BeaconId::new("b1");
    for _ in 0..30 {
        let out = c.filter(&id, -70.0);
        assert_relative_eq!(out, -70.0, epsilon = 1e-4);
    }
}

#[test]
fn test_first_reading_passes_through() {
    let mut c = conditioner();
    let out = c.filter(&BeaconId::new("b1"), -63.0);
    assert_relative_eq!(out, -63.0);
    let cov = c.get(&BeaconId::new("b1")).unwrap().error_covariance();
    assert_relative_eq!(cov, 0.875, epsilon = 1e-6);
}

#[test]
fn test_single_spike_is_attenuated() {
    let mut c = conditioner();
    let id = BeaconId::new("b1");
    for _ in 0..20 {
        c.filter(&id, -70.0);
    }
    let out = c.filter(&id, -90.0);
    // Less than half of the 20 dB jump reaches the output
    assert!((out + 70.0).abs() < 10.0, "output {}", out);
}

#[test]
fn test_sustained_level_is_tracked() {
    let mut c = conditioner();
    let id = BeaconId::new("b1");
    for _ in 0..20 {
        c.filter(&id, -70.0);
    }
    let mut out = 0.0;
    for _ in 0..100 {
        out = c.filter(&id, -80.0);
    }
    assert_relative_eq!(out, -80.0, epsilon = 0.5);
}

#[test]
fn test_beacons_filtered_independently() {
    let mut c = conditioner();
    let a = BeaconId::new("a");
    let b = BeaconId::new("b");
    for _ in 0..10 {
        c.filter(&a, -50.0);
    }
    let out = c.filter(&b, -90.0);
    assert_relative_eq!(out, -90.0);
    assert_eq!(c.beacon_count(), 2);
}

// ============================================================================
// Gating
// ============================================================================

#[test]
fn test_aggregator_gate_and_flush() {
    let mut agg = ObservationAggregator::new(3);
    assert!(agg.insert(BeaconId::new("a"), -50.0).is_none());
    assert!(agg.insert(BeaconId::new("b"), -60.0).is_none());
    // Repeated id does not count twice
    assert!(agg.insert(BeaconId::new("b"), -61.0).is_none());

    let snapshot = agg.insert(BeaconId::new("c"), -70.0).unwrap();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.get(&BeaconId::new("b")), Some(-61.0));

    // Every further reading fires while the window is full
    assert!(agg.insert(BeaconId::new("a"), -52.0).is_some());

    assert_eq!(agg.flush(), 3);
    assert!(agg.is_empty());
    assert!(agg.insert(BeaconId::new("a"), -50.0).is_none());
}

// ============================================================================
// EKF
// ============================================================================

fn ekf_at_origin() -> PositionEkf {
    PositionEkf::new(&EstimatorConfig {
        initial_position: [0.0, 0.0],
        ..EstimatorConfig::default()
    })
}

#[test]
fn test_square_walk_returns_to_start() {
    let mut ekf = ekf_at_origin();
    for heading in [0.0, 90.0, 180.0, 270.0] {
        ekf.predict(heading, 1.0);
    }
    let p = ekf.position();
    assert_relative_eq!(p.x, 0.0, epsilon = 1e-4);
    assert_relative_eq!(p.y, 0.0, epsilon = 1e-4);
}

#[test]
fn test_uncertainty_grows_without_fixes() {
    let mut ekf = ekf_at_origin();
    let mut last = ekf.state().uncertainty();
    for _ in 0..10 {
        ekf.predict(45.0, 0.5);
        let u = ekf.state().uncertainty();
        assert!(u > last);
        last = u;
    }
}

#[test]
fn test_repeated_fixes_converge() {
    let mut ekf = ekf_at_origin();
    let fix = WorldPoint::new(4.0, -2.0);
    for _ in 0..50 {
        ekf.predict(0.0, 0.0);
        assert_eq!(ekf.update(fix), UpdateOutcome::Applied);
    }
    let p = ekf.position();
    assert_relative_eq!(p.x, 4.0, epsilon = 1e-2);
    assert_relative_eq!(p.y, -2.0, epsilon = 1e-2);
}

#[test]
fn test_fix_at_estimate_shrinks_uncertainty() {
    let mut ekf = ekf_at_origin();
    ekf.predict(120.0, 0.7);
    let before = ekf.state();
    ekf.update(before.position);
    let after = ekf.state();
    assert!(after.uncertainty() <= before.uncertainty());
    assert_relative_eq!(after.position.x, before.position.x, epsilon = 1e-5);
    assert_relative_eq!(after.position.y, before.position.y, epsilon = 1e-5);
}
