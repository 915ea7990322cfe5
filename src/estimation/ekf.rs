//! Extended Kalman Filter fusing dead reckoning with fingerprint fixes.
//!
//! # State Representation
//!
//! `x = [px, py, θ, v]` with a 4×4 covariance. Heading and speed are taken
//! directly from the inertial stream on every prediction, so their process
//! noise mostly shapes how position uncertainty grows.
//!
//! # Algorithm
//!
//! 1. **Prediction**: on each speed sample, overwrite θ and v, integrate
//!    position over `dt`, propagate covariance through the motion Jacobian
//! 2. **Update**: on each position fix, linear update of the position
//!    components; a singular innovation covariance rejects the fix

use crate::config::EstimatorConfig;
use crate::core::{WorldPoint, normalize_angle};
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use tracing::{debug, trace};

/// Whether a measurement was fused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    Rejected,
}

/// Immutable snapshot of the estimator
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EstimatorState {
    pub position: WorldPoint,
    /// Heading in radians
    pub heading: f32,
    /// Speed in m/s
    pub speed: f32,
    pub covariance: Matrix4<f32>,
}

impl EstimatorState {
    /// Heading in degrees
    pub fn heading_deg(&self) -> f32 {
        self.heading.to_degrees()
    }

    /// Sum of the state variances
    pub fn uncertainty(&self) -> f32 {
        self.covariance.trace()
    }
}

/// Position/heading/speed EKF.
#[derive(Clone, Debug)]
pub struct PositionEkf {
    x: Vector4<f32>,
    p: Matrix4<f32>,
    q: Matrix4<f32>,
    r: Matrix2<f32>,
    h: Matrix2x4<f32>,
    dt: f32,
    speed_scale: f32,
}

impl PositionEkf {
    pub fn new(config: &EstimatorConfig) -> Self {
        let [px, py] = config.initial_position;
        let [qx, qy, qt, qv] = config.process_noise;
        let [rx, ry] = config.measurement_noise;

        Self {
            x: Vector4::new(px, py, config.initial_heading_deg.to_radians(), 0.0),
            p: Matrix4::identity() * config.initial_variance,
            q: Matrix4::from_diagonal(&Vector4::new(qx, qy, qt, qv)),
            r: Matrix2::from_diagonal(&Vector2::new(rx, ry)),
            h: Matrix2x4::new(
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0,
            ),
            dt: config.dt,
            speed_scale: config.speed_scale,
        }
    }

    /// Dead-reckoning step from an inertial heading (degrees) and speed.
    pub fn predict(&mut self, heading_deg: f32, speed: f32) {
        let theta = normalize_angle(heading_deg.to_radians());
        let v = speed * self.speed_scale;
        let dt = self.dt;
        let (sin, cos) = theta.sin_cos();

        self.x[2] = theta;
        self.x[3] = v;
        self.x[0] += v * cos * dt;
        self.x[1] += v * sin * dt;

        let mut a = Matrix4::identity();
        a[(0, 2)] = -v * sin * dt;
        a[(0, 3)] = cos * dt;
        a[(1, 2)] = v * cos * dt;
        a[(1, 3)] = sin * dt;

        self.p = a * self.p * a.transpose() + self.q;

        trace!(
            "[EKF] predict: heading={:.1}° v={:.2} -> ({:.2},{:.2})",
            heading_deg, v, self.x[0], self.x[1]
        );
    }

    /// Fuse a position fix.
    pub fn update(&mut self, fix: WorldPoint) -> UpdateOutcome {
        if !fix.x.is_finite() || !fix.y.is_finite() {
            debug!("[EKF] rejected non-finite fix");
            return UpdateOutcome::Rejected;
        }

        let z = Vector2::new(fix.x, fix.y);
        let innovation = z - self.h * self.x;
        let s = self.h * self.p * self.h.transpose() + self.r;

        let Some(s_inv) = s.try_inverse().filter(|m| m.iter().all(|v| v.is_finite())) else {
            debug!("[EKF] rejected fix: singular innovation covariance");
            return UpdateOutcome::Rejected;
        };

        let k = self.p * self.h.transpose() * s_inv;
        self.x += k * innovation;
        self.p = (Matrix4::identity() - k * self.h) * self.p;

        trace!(
            "[EKF] update: fix=({:.2},{:.2}) -> ({:.2},{:.2})",
            fix.x, fix.y, self.x[0], self.x[1]
        );
        UpdateOutcome::Applied
    }

    /// Snapshot of the current estimate
    pub fn state(&self) -> EstimatorState {
        EstimatorState {
            position: self.position(),
            heading: self.x[2],
            speed: self.x[3],
            covariance: self.p,
        }
    }

    /// Current position estimate
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x[0], self.x[1])
    }

    /// Shift the position outside the measurement path and inflate its
    /// covariance block by `inflation`.
    ///
    /// Reserved for the wall-avoidance corrector.
    pub(crate) fn shift_position(&mut self, delta: WorldPoint, inflation: f32) {
        self.x[0] += delta.x;
        self.x[1] += delta.y;
        for i in 0..2 {
            for j in 0..2 {
                self.p[(i, j)] *= inflation;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ekf() -> PositionEkf {
        PositionEkf::new(&EstimatorConfig::default())
    }

    #[test]
    fn test_initial_state() {
        let f = ekf();
        let s = f.state();
        assert_eq!(s.position, WorldPoint::new(1.2, 0.3));
        assert_eq!(s.speed, 0.0);
        assert!((s.uncertainty() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_predict_zero_speed_keeps_position() {
        let mut f = ekf();
        let before = f.position();
        f.predict(73.0, 0.0);
        assert_eq!(f.position(), before);
        // Uncertainty still grows by Q
        assert!(f.state().uncertainty() > 0.4);
    }

    #[test]
    fn test_predict_integrates_heading() {
        let mut f = ekf();
        f.predict(90.0, 0.5);
        let p = f.position();
        assert!((p.x - 1.2).abs() < 1e-5);
        assert!((p.y - 0.8).abs() < 1e-5);
        assert!((f.state().heading_deg() - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_speed_scale() {
        let config = EstimatorConfig {
            speed_scale: 0.65,
            ..EstimatorConfig::default()
        };
        let mut f = PositionEkf::new(&config);
        f.predict(0.0, 1.0);
        assert!((f.position().x - 1.85).abs() < 1e-5);
        assert!((f.state().speed - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_update_at_estimate_does_not_grow_uncertainty() {
        let mut f = ekf();
        f.predict(30.0, 0.4);
        let before = f.state();

        let outcome = f.update(before.position);
        assert_eq!(outcome, UpdateOutcome::Applied);

        let after = f.state();
        assert!(after.uncertainty() <= before.uncertainty());
        assert!(after.position.distance(&before.position) < 1e-5);
    }

    #[test]
    fn test_update_moves_toward_fix() {
        let mut f = ekf();
        let fix = WorldPoint::new(3.0, 0.3);
        f.update(fix);
        let x = f.position().x;
        assert!(x > 1.2 && x < 3.0);
    }

    #[test]
    fn test_singular_innovation_rejected() {
        let config = EstimatorConfig {
            initial_variance: 0.0,
            measurement_noise: [0.0, 0.0],
            ..EstimatorConfig::default()
        };
        let mut f = PositionEkf::new(&config);
        let before = f.state();
        assert_eq!(f.update(WorldPoint::new(5.0, 5.0)), UpdateOutcome::Rejected);
        assert_eq!(f.state(), before);
    }

    #[test]
    fn test_tight_noise_fix_applied() {
        // det(S) = 4e-10, small but well conditioned
        let config = EstimatorConfig {
            initial_variance: 1e-5,
            measurement_noise: [1e-5, 1e-5],
            ..EstimatorConfig::default()
        };
        let mut f = PositionEkf::new(&config);
        let before = f.position();
        assert_eq!(f.update(WorldPoint::new(1.4, 0.3)), UpdateOutcome::Applied);
        assert!((f.position().x - (before.x + 0.1)).abs() < 1e-4);
    }

    #[test]
    fn test_non_finite_fix_rejected() {
        let mut f = ekf();
        assert_eq!(
            f.update(WorldPoint::new(f32::NAN, 0.0)),
            UpdateOutcome::Rejected
        );
    }

    #[test]
    fn test_shift_position_inflates_block() {
        let mut f = ekf();
        f.shift_position(WorldPoint::new(0.1, -0.1), 1.2);
        let s = f.state();
        assert!((s.position.x - 1.3).abs() < 1e-6);
        assert!((s.position.y - 0.2).abs() < 1e-6);
        assert!((s.covariance[(0, 0)] - 0.12).abs() < 1e-6);
        assert!((s.covariance[(1, 1)] - 0.12).abs() < 1e-6);
        assert!((s.covariance[(2, 2)] - 0.1).abs() < 1e-6);
    }
}
