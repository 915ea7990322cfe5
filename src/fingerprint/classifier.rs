//! Nearest-centroid cell classifier, trained offline from the fingerprint database.
//!
//! Each calibration position is one class. Features are the per-beacon
//! signals (absent beacons take the sentinel) followed by the one-hot
//! compass quadrant of the heading, scaled so a quadrant mismatch weighs
//! like a signal-strength step.

use crate::core::{Direction, WorldPoint};
use crate::error::{MargaError, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

use super::Locator;
use super::database::FingerprintDatabase;
use super::types::{BeaconId, LocateResult, SignalVector};

/// Feature value of an active quadrant (dB-equivalent)
const DIRECTION_WEIGHT: f32 = 10.0;

/// Number of candidate cells reported per query
const MAX_CANDIDATES: usize = 3;

/// One class: a calibration cell and its mean feature vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellClass {
    /// Center of the calibration cell
    pub position: WorldPoint,
    /// Mean features, beacons first then the four quadrants
    pub centroid: Vec<f32>,
    /// Training samples behind the centroid
    pub samples: usize,
}

/// Discrete-cell locator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellClassifier {
    beacons: Vec<BeaconId>,
    missing_signal: f32,
    classes: Vec<CellClass>,
}

impl CellClassifier {
    /// Fit one centroid per calibration position.
    pub fn train(db: &FingerprintDatabase) -> Result<Self> {
        let beacons = db.beacon_ids();
        let missing_signal = db.missing_signal();
        let width = beacons.len() + Direction::ALL.len();

        let mut classes: Vec<CellClass> = Vec::new();
        for sample in db.samples() {
            if sample.signals.is_empty() {
                continue;
            }
            let features = encode(&beacons, missing_signal, &sample.signals, sample.direction);

            let class = match classes.iter().position(|c| c.position == sample.position) {
                Some(i) => &mut classes[i],
                None => {
                    classes.push(CellClass {
                        position: sample.position,
                        centroid: vec![0.0; width],
                        samples: 0,
                    });
                    let last = classes.len() - 1;
                    &mut classes[last]
                }
            };
            for (acc, f) in class.centroid.iter_mut().zip(&features) {
                *acc += f;
            }
            class.samples += 1;
        }

        if classes.is_empty() {
            return Err(MargaError::InsufficientData {
                available: 0,
                required: 1,
            });
        }

        for class in &mut classes {
            let n = class.samples as f32;
            for v in &mut class.centroid {
                *v /= n;
            }
        }

        info!(
            "[Classifier] trained {} cells over {} beacons",
            classes.len(),
            beacons.len()
        );

        Ok(Self {
            beacons,
            missing_signal,
            classes,
        })
    }

    /// Trained classes in training order
    pub fn classes(&self) -> &[CellClass] {
        &self.classes
    }

    /// Classify a live vector taken while facing `direction`.
    pub fn classify(&self, signals: &SignalVector, direction: Direction) -> Result<LocateResult> {
        if self.classes.is_empty() {
            return Err(MargaError::InsufficientData {
                available: 0,
                required: 1,
            });
        }

        let features = encode(&self.beacons, self.missing_signal, signals, Some(direction));
        let mut ranked: Vec<(f32, WorldPoint)> = self
            .classes
            .iter()
            .map(|c| {
                let sq: f32 = c
                    .centroid
                    .iter()
                    .zip(&features)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                (sq.sqrt(), c.position)
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.truncate(MAX_CANDIDATES);

        let (best_d, best) = ranked[0];
        debug!(
            "[Classifier] {} -> ({:.2},{:.2}) d={:.2}",
            direction, best.x, best.y, best_d
        );

        Ok(LocateResult {
            position: best,
            candidates: ranked.iter().map(|r| r.1).collect(),
            distances: ranked.iter().map(|r| r.0).collect(),
        })
    }

    /// Save as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        info!("[Classifier] saved to {:?}", path);
        Ok(())
    }

    /// Load a classifier saved with [`CellClassifier::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let classifier: Self = serde_json::from_reader(BufReader::new(file))?;
        let width = classifier.beacons.len() + Direction::ALL.len();
        if classifier.classes.iter().any(|c| c.centroid.len() != width) {
            return Err(MargaError::InvalidFormat(format!(
                "Centroid width does not match {} features",
                width
            )));
        }
        info!(
            "[Classifier] loaded {} cells from {:?}",
            classifier.classes.len(),
            path
        );
        Ok(classifier)
    }
}

impl Locator for CellClassifier {
    fn name(&self) -> &'static str {
        "classifier"
    }

    fn locate(&self, signals: &SignalVector, heading_deg: f32) -> Result<LocateResult> {
        self.classify(signals, Direction::from_heading_deg(heading_deg))
    }
}

/// Dense feature row for one observation
fn encode(
    beacons: &[BeaconId],
    missing_signal: f32,
    signals: &SignalVector,
    direction: Option<Direction>,
) -> Vec<f32> {
    let mut features: Vec<f32> = beacons
        .iter()
        .map(|id| signals.get(id).unwrap_or(missing_signal))
        .collect();
    let one_hot = direction.map(Direction::one_hot).unwrap_or([0.0; 4]);
    features.extend(one_hot.iter().map(|v| v * DIRECTION_WEIGHT));
    features
}
