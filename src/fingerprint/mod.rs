//! Fingerprint localization: turning a beacon-signal vector into a position fix.
//!
//! Two interchangeable strategies sit behind [`Locator`]:
//! - [`KnnLocator`]: weighted k-nearest-neighbor over raw calibration samples
//! - [`CellClassifier`]: nearest-centroid classifier returning a calibration cell center

mod calibration;
mod classifier;
mod database;
mod knn;
mod types;

pub use calibration::CalibrationSession;
pub use classifier::{CellClass, CellClassifier};
pub use database::{DEFAULT_MISSING_SIGNAL, FingerprintDatabase};
pub use knn::KnnLocator;
pub use types::{BeaconId, FingerprintSample, LocateResult, SignalVector};

use crate::config::{LocatorConfig, LocatorStrategy};
use crate::error::Result;
use std::path::Path;
use tracing::info;

/// Build the configured locator strategy from a calibration database.
///
/// The classifier is loaded from `classifier_path` when that file exists,
/// otherwise trained from `db`.
pub fn locator_from_config(
    config: &LocatorConfig,
    db: FingerprintDatabase,
) -> Result<Box<dyn Locator>> {
    let mut db = if db.is_indexed() {
        db
    } else {
        db.with_missing_signal(config.missing_signal)
    };
    match config.strategy {
        LocatorStrategy::Knn => {
            if !db.is_indexed() {
                db.build_index()?;
            }
            info!("Locator: k-NN (k={}, weighted={})", config.k, config.weighted);
            Ok(Box::new(KnnLocator::new(db, config.k, config.weighted)?))
        }
        LocatorStrategy::Classifier => {
            let classifier = match config.classifier_path.as_deref().map(Path::new) {
                Some(path) if path.exists() => CellClassifier::load(path)?,
                _ => CellClassifier::train(&db)?,
            };
            info!("Locator: cell classifier ({} cells)", classifier.classes().len());
            Ok(Box::new(classifier))
        }
    }
}

/// Signal-vector to position strategy.
pub trait Locator: Send {
    /// Short strategy name for logs
    fn name(&self) -> &'static str;

    /// Estimate a position from an aggregated observation.
    ///
    /// `heading_deg` is available to strategies that use the facing
    /// direction as a feature. Fails with `InsufficientData` when the
    /// strategy has too little data to answer.
    fn locate(&self, signals: &SignalVector, heading_deg: f32) -> Result<LocateResult>;
}
