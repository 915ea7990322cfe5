//! k-nearest-neighbor locator over the fingerprint database.

use crate::error::{MargaError, Result};

use super::Locator;
use super::database::FingerprintDatabase;
use super::types::{LocateResult, SignalVector};

/// Continuous-position locator: weighted mean of the `k` closest samples.
#[derive(Clone, Debug)]
pub struct KnnLocator {
    db: FingerprintDatabase,
    k: usize,
    weighted: bool,
}

impl KnnLocator {
    /// Wrap an indexed database.
    pub fn new(db: FingerprintDatabase, k: usize, weighted: bool) -> Result<Self> {
        if !db.is_indexed() {
            return Err(MargaError::IndexNotBuilt);
        }
        Ok(Self { db, k, weighted })
    }

    pub fn database(&self) -> &FingerprintDatabase {
        &self.db
    }
}

impl Locator for KnnLocator {
    fn name(&self) -> &'static str {
        "knn"
    }

    fn locate(&self, signals: &SignalVector, _heading_deg: f32) -> Result<LocateResult> {
        self.db.locate(signals, self.k, self.weighted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorldPoint;
    use crate::fingerprint::BeaconId;

    #[test]
    fn test_requires_indexed_database() {
        let db = FingerprintDatabase::new(1);
        assert!(matches!(
            KnnLocator::new(db, 1, true),
            Err(MargaError::IndexNotBuilt)
        ));
    }

    #[test]
    fn test_heading_is_ignored() {
        let mut db = FingerprintDatabase::new(1);
        let v: SignalVector = [(BeaconId::new("a"), -50.0)].into_iter().collect();
        db.collect(WorldPoint::new(2.0, 3.0), None, v.clone()).unwrap();
        db.build_index().unwrap();

        let locator = KnnLocator::new(db, 1, false).unwrap();
        let a = locator.locate(&v, 0.0).unwrap();
        let b = locator.locate(&v, 180.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.position, WorldPoint::new(2.0, 3.0));
    }
}
