//! Configuration loading for Marga

use crate::core::WorldPoint;
use crate::error::{MargaError, Result};
use crate::fingerprint::BeaconId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MargaConfig {
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub beacons: BeaconsConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub correction: CorrectionConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub destinations: Vec<Destination>,
}

/// Floor plan and calibration data files
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapConfig {
    /// Occupancy grid file (`.mgrid` binary, anything else ASCII)
    #[serde(default = "default_grid_path")]
    pub grid_path: String,

    /// Fingerprint database (JSON)
    #[serde(default = "default_fingerprint_db_path")]
    pub fingerprint_db_path: String,

    /// Cell size in meters for ASCII grids (default: 0.25)
    #[serde(default = "default_resolution")]
    pub resolution: f32,

    /// World coordinates of the corner of cell (0, 0) for ASCII grids
    #[serde(default = "default_origin")]
    pub origin: [f32; 2],
}

/// Known beacons
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BeaconsConfig {
    /// Beacon identifiers whose filters are created at startup
    #[serde(default)]
    pub roster: Vec<BeaconId>,
}

/// Per-beacon adaptive filter parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Kalman process noise (default: 0.08)
    #[serde(default = "default_process_noise")]
    pub process_noise: f32,

    /// Measurement noise for ordinary readings (default: 7.0)
    #[serde(default = "default_baseline_noise")]
    pub baseline_noise: f32,

    /// Measurement noise for a detected spike (default: 20.0)
    #[serde(default = "default_spike_noise")]
    pub spike_noise: f32,

    /// Jump between consecutive readings that counts as a spike (default: 6.0)
    #[serde(default = "default_spike_threshold")]
    pub spike_threshold: f32,

    /// Mean recent jump below which the history counts as quiet (default: 2.0)
    #[serde(default = "default_quiet_threshold")]
    pub quiet_threshold: f32,

    /// Length of the jump history (default: 5)
    #[serde(default = "default_window")]
    pub delta_window: usize,

    /// Length of the moving average (default: 5)
    #[serde(default = "default_window")]
    pub average_window: usize,
}

/// Observation gating
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Distinct beacons required before a locate-and-fuse cycle (default: 6)
    #[serde(default = "default_min_beacons")]
    pub min_beacons: usize,

    /// Aggregate flush period in milliseconds (default: 2000)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

/// Locator strategy selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorStrategy {
    /// k-nearest-neighbor over calibration samples
    #[default]
    Knn,
    /// Nearest-centroid cell classifier
    Classifier,
}

/// Fingerprint locator parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocatorConfig {
    #[serde(default)]
    pub strategy: LocatorStrategy,

    /// Neighbors averaged by the k-NN locator (default: 3)
    #[serde(default = "default_k")]
    pub k: usize,

    /// Inverse-distance weighting of neighbors (default: true)
    #[serde(default = "default_true")]
    pub weighted: bool,

    /// Signal assumed for an unheard beacon in dBm (default: -100)
    #[serde(default = "default_missing_signal")]
    pub missing_signal: f32,

    /// Samples that complete one calibration point (default: 20)
    #[serde(default = "default_required_samples")]
    pub required_samples: usize,

    /// Trained classifier (JSON); trained from the database if absent
    #[serde(default)]
    pub classifier_path: Option<String>,
}

/// EKF parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Integration step per speed sample in seconds (default: 1.0)
    #[serde(default = "default_dt")]
    pub dt: f32,

    /// Factor applied to reported speed (default: 1.0)
    #[serde(default = "default_speed_scale")]
    pub speed_scale: f32,

    /// Starting position in meters (default: [1.2, 0.3])
    #[serde(default = "default_initial_position")]
    pub initial_position: [f32; 2],

    /// Starting heading in degrees (default: 0)
    #[serde(default)]
    pub initial_heading_deg: f32,

    /// Diagonal of the initial covariance (default: 0.1)
    #[serde(default = "default_initial_variance")]
    pub initial_variance: f32,

    /// Process noise diagonal for [x, y, heading, speed]
    #[serde(default = "default_ekf_process_noise")]
    pub process_noise: [f32; 4],

    /// Measurement noise diagonal for [x, y]
    #[serde(default = "default_ekf_measurement_noise")]
    pub measurement_noise: [f32; 2],
}

/// Route planner parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Weight of the wall-proximity step cost (default: 2.5)
    #[serde(default = "default_penalty_strength")]
    pub penalty_strength: f32,

    /// Distance to the destination that counts as arrived, meters (default: 0.35)
    #[serde(default = "default_arrival_tolerance")]
    pub arrival_tolerance: f32,
}

/// Wall-avoidance corrector parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorrectionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Check period in milliseconds (default: 1000)
    #[serde(default = "default_correction_interval_ms")]
    pub interval_ms: u64,

    /// Clearance in cells below which the estimate is pulled to the cell center (default: 2)
    #[serde(default = "default_clearance_threshold")]
    pub clearance_threshold: u32,

    /// Fraction of the offset to the cell center applied per check (default: 0.5)
    #[serde(default = "default_centering_strength")]
    pub centering_strength: f32,

    /// Factor applied to the position covariance block (default: 1.2)
    #[serde(default = "default_covariance_inflation")]
    pub covariance_inflation: f32,
}

/// Calibration lattice
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Points per row (default: 8)
    #[serde(default = "default_calibration_cols")]
    pub cols: usize,

    /// Rows of points (default: 5)
    #[serde(default = "default_calibration_rows")]
    pub rows: usize,

    /// Point spacing along x in meters (default: 1.35)
    #[serde(default = "default_cell_width")]
    pub cell_width: f32,

    /// Point spacing along y in meters (default: 1.44)
    #[serde(default = "default_cell_height")]
    pub cell_height: f32,

    /// World coordinates of the lattice corner
    #[serde(default = "default_origin")]
    pub origin: [f32; 2],

    /// Distinct beacons that make one sample (default: 4)
    #[serde(default = "default_min_beacons_per_sample")]
    pub min_beacons_per_sample: usize,
}

/// Named destination
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub x: f32,
    pub y: f32,
}

impl Destination {
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            grid_path: default_grid_path(),
            fingerprint_db_path: default_fingerprint_db_path(),
            resolution: default_resolution(),
            origin: default_origin(),
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            process_noise: default_process_noise(),
            baseline_noise: default_baseline_noise(),
            spike_noise: default_spike_noise(),
            spike_threshold: default_spike_threshold(),
            quiet_threshold: default_quiet_threshold(),
            delta_window: default_window(),
            average_window: default_window(),
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            min_beacons: default_min_beacons(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            strategy: LocatorStrategy::default(),
            k: default_k(),
            weighted: default_true(),
            missing_signal: default_missing_signal(),
            required_samples: default_required_samples(),
            classifier_path: None,
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            speed_scale: default_speed_scale(),
            initial_position: default_initial_position(),
            initial_heading_deg: 0.0,
            initial_variance: default_initial_variance(),
            process_noise: default_ekf_process_noise(),
            measurement_noise: default_ekf_measurement_noise(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            penalty_strength: default_penalty_strength(),
            arrival_tolerance: default_arrival_tolerance(),
        }
    }
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_ms: default_correction_interval_ms(),
            clearance_threshold: default_clearance_threshold(),
            centering_strength: default_centering_strength(),
            covariance_inflation: default_covariance_inflation(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            cols: default_calibration_cols(),
            rows: default_calibration_rows(),
            cell_width: default_cell_width(),
            cell_height: default_cell_height(),
            origin: default_origin(),
            min_beacons_per_sample: default_min_beacons_per_sample(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_grid_path() -> String {
    "maps/floor.mgrid".to_string()
}
fn default_fingerprint_db_path() -> String {
    "maps/fingerprint_db.json".to_string()
}
fn default_resolution() -> f32 {
    0.25
}
fn default_origin() -> [f32; 2] {
    [0.0, 0.0]
}

// Signal defaults
fn default_process_noise() -> f32 {
    0.08
}
fn default_baseline_noise() -> f32 {
    7.0
}
fn default_spike_noise() -> f32 {
    20.0
}
fn default_spike_threshold() -> f32 {
    6.0
}
fn default_quiet_threshold() -> f32 {
    2.0
}
fn default_window() -> usize {
    5
}

// Fusion and locator defaults
fn default_min_beacons() -> usize {
    6
}
fn default_flush_interval_ms() -> u64 {
    2000
}
fn default_k() -> usize {
    3
}
fn default_missing_signal() -> f32 {
    -100.0
}
fn default_required_samples() -> usize {
    20
}

// Estimator defaults
fn default_dt() -> f32 {
    1.0
}
fn default_speed_scale() -> f32 {
    1.0
}
fn default_initial_position() -> [f32; 2] {
    [1.2, 0.3]
}
fn default_initial_variance() -> f32 {
    0.1
}
fn default_ekf_process_noise() -> [f32; 4] {
    [0.05, 0.05, 0.01, 0.1]
}
fn default_ekf_measurement_noise() -> [f32; 2] {
    [0.2, 0.2]
}

// Planner and correction defaults
fn default_penalty_strength() -> f32 {
    2.5
}
fn default_arrival_tolerance() -> f32 {
    0.35
}
fn default_correction_interval_ms() -> u64 {
    1000
}
fn default_clearance_threshold() -> u32 {
    2
}
fn default_centering_strength() -> f32 {
    0.5
}
fn default_covariance_inflation() -> f32 {
    1.2
}

// Calibration defaults (10.8m x 7.2m room in an 8x5 lattice)
fn default_calibration_cols() -> usize {
    8
}
fn default_calibration_rows() -> usize {
    5
}
fn default_cell_width() -> f32 {
    1.35
}
fn default_cell_height() -> f32 {
    1.44
}
fn default_min_beacons_per_sample() -> usize {
    4
}

impl FusionConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl CorrectionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl MargaConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MargaError::Config(format!("Failed to read config file: {}", e)))?;
        let config: MargaConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(MargaError::Config(msg.to_string()));

        let s = &self.signal;
        if s.delta_window == 0 || s.average_window == 0 {
            return fail("signal windows must be non-zero");
        }
        if s.process_noise < 0.0 || s.baseline_noise <= 0.0 || s.spike_noise <= 0.0 {
            return fail("signal noise must be positive");
        }
        if self.fusion.min_beacons == 0 {
            return fail("fusion.min_beacons must be non-zero");
        }
        if self.fusion.flush_interval_ms == 0 {
            return fail("fusion.flush_interval_ms must be non-zero");
        }
        if self.locator.k == 0 {
            return fail("locator.k must be non-zero");
        }
        if self.locator.required_samples == 0 {
            return fail("locator.required_samples must be non-zero");
        }

        let e = &self.estimator;
        if e.dt.is_nan() || e.dt <= 0.0 {
            return fail("estimator.dt must be positive");
        }
        if e.initial_variance < 0.0
            || e.process_noise.iter().any(|v| *v < 0.0)
            || e.measurement_noise.iter().any(|v| *v < 0.0)
        {
            return fail("estimator noise must be non-negative");
        }

        if self.planner.penalty_strength < 0.0 {
            return fail("planner.penalty_strength must be non-negative");
        }
        if self.planner.arrival_tolerance < 0.0 {
            return fail("planner.arrival_tolerance must be non-negative");
        }
        if self.correction.interval_ms == 0 {
            return fail("correction.interval_ms must be non-zero");
        }
        if self.correction.covariance_inflation < 1.0 {
            return fail("correction.covariance_inflation must be at least 1");
        }
        if self.map.resolution.is_nan() || self.map.resolution <= 0.0 {
            return fail("map.resolution must be positive");
        }
        if self.calibration.cols == 0 || self.calibration.rows == 0 {
            return fail("calibration lattice must be non-empty");
        }
        Ok(())
    }

    /// Look up a destination by name
    pub fn destination(&self, name: &str) -> Result<&Destination> {
        self.destinations
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| MargaError::UnknownDestination(name.to_string()))
    }
}
