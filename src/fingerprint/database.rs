//! Fingerprint database: calibration samples and the nearest-neighbor index.
//!
//! Samples are collected during calibration, then [`FingerprintDatabase::build_index`]
//! lays every sample out as a dense row over the union of all beacon ids seen,
//! filling absent beacons with a weak sentinel signal. Queries compare a live
//! vector against every row, so partial overlap is never rewarded.

use crate::core::{Direction, WorldPoint};
use crate::error::{MargaError, Result};
use std::collections::{HashMap, HashSet};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

use super::types::{BeaconId, FingerprintSample, LocateResult, SignalVector};

/// Signal strength assumed for a beacon that was not heard (dBm)
pub const DEFAULT_MISSING_SIGNAL: f32 = -100.0;

/// Guards the inverse-distance weight of an exact match
const WEIGHT_EPSILON: f32 = 1e-6;

/// Hashable key for an exact calibration position
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PositionKey(u32, u32);

impl From<WorldPoint> for PositionKey {
    fn from(p: WorldPoint) -> Self {
        PositionKey(p.x.to_bits(), p.y.to_bits())
    }
}

/// Dense sample matrix built once before the first query
#[derive(Clone, Debug)]
struct FingerprintIndex {
    /// Beacon id of each column
    beacons: Vec<BeaconId>,
    column: HashMap<BeaconId, usize>,
    /// Indices into `samples` of the rows
    sample_ids: Vec<usize>,
    /// Row-major, `sample_ids.len() * beacons.len()`
    rows: Vec<f32>,
    /// Sentinel the rows were filled with
    missing_signal: f32,
}

/// Ordered collection of calibration samples.
#[derive(Clone, Debug)]
pub struct FingerprintDatabase {
    samples: Vec<FingerprintSample>,
    required_samples: usize,
    missing_signal: f32,
    counts: HashMap<PositionKey, usize>,
    index: Option<FingerprintIndex>,
}

impl FingerprintDatabase {
    /// Create an empty database.
    ///
    /// A position is complete once it holds `required_samples` samples.
    pub fn new(required_samples: usize) -> Self {
        Self {
            samples: Vec::new(),
            required_samples,
            missing_signal: DEFAULT_MISSING_SIGNAL,
            counts: HashMap::new(),
            index: None,
        }
    }

    /// Create a database from existing samples, preserving their order.
    pub fn from_samples(samples: Vec<FingerprintSample>, required_samples: usize) -> Self {
        let mut db = Self::new(required_samples);
        for sample in &samples {
            *db.counts.entry(sample.position.into()).or_insert(0) += 1;
        }
        db.samples = samples;
        db
    }

    /// Override the sentinel used for beacons absent from a vector.
    ///
    /// Takes effect at [`FingerprintDatabase::build_index`].
    pub fn with_missing_signal(mut self, missing_signal: f32) -> Self {
        self.missing_signal = missing_signal;
        self
    }

    /// Add one sample taken at `position`.
    ///
    /// Returns true once the position has reached the required sample count.
    pub fn collect(
        &mut self,
        position: WorldPoint,
        direction: Option<Direction>,
        signals: SignalVector,
    ) -> Result<bool> {
        if self.index.is_some() {
            return Err(MargaError::IndexAlreadyBuilt);
        }
        self.samples
            .push(FingerprintSample::new(position, direction, signals));
        let count = self.counts.entry(position.into()).or_insert(0);
        *count += 1;
        Ok(*count >= self.required_samples)
    }

    /// Number of samples recorded at `position`
    pub fn samples_at(&self, position: WorldPoint) -> usize {
        self.counts.get(&position.into()).copied().unwrap_or(0)
    }

    /// Whether `position` has reached the required sample count
    pub fn is_complete(&self, position: WorldPoint) -> bool {
        self.samples_at(position) >= self.required_samples
    }

    /// Required samples per position
    pub fn required_samples(&self) -> usize {
        self.required_samples
    }

    /// Sentinel signal for absent beacons
    pub fn missing_signal(&self) -> f32 {
        self.missing_signal
    }

    /// All samples in insertion order
    pub fn samples(&self) -> &[FingerprintSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Distinct calibration positions in first-seen order
    pub fn positions(&self) -> Vec<WorldPoint> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for s in &self.samples {
            if seen.insert(PositionKey::from(s.position)) {
                out.push(s.position);
            }
        }
        out
    }

    /// Union of all beacon ids, sorted
    pub fn beacon_ids(&self) -> Vec<BeaconId> {
        let mut ids: Vec<BeaconId> = self
            .samples
            .iter()
            .flat_map(|s| s.signals.ids().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Finalize the database for querying. Must be called exactly once.
    pub fn build_index(&mut self) -> Result<()> {
        if self.index.is_some() {
            return Err(MargaError::IndexAlreadyBuilt);
        }

        let beacons = self.beacon_ids();
        let column: HashMap<BeaconId, usize> = beacons
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let mut sample_ids = Vec::with_capacity(self.samples.len());
        let mut rows = Vec::with_capacity(self.samples.len() * beacons.len());

        for (i, sample) in self.samples.iter().enumerate() {
            // Empty vectors carry no information
            if sample.signals.is_empty() {
                continue;
            }
            let start = rows.len();
            rows.resize(start + beacons.len(), self.missing_signal);
            for (id, v) in sample.signals.iter() {
                if let Some(&c) = column.get(id) {
                    rows[start + c] = v;
                }
            }
            sample_ids.push(i);
        }

        info!(
            "[Fingerprint] index built: {} usable samples, {} beacons, {} positions",
            sample_ids.len(),
            beacons.len(),
            self.counts.len()
        );

        self.index = Some(FingerprintIndex {
            beacons,
            column,
            sample_ids,
            rows,
            missing_signal: self.missing_signal,
        });
        Ok(())
    }

    /// Find the `k` nearest samples to a live vector.
    ///
    /// The estimate is the (inverse-distance weighted, if `weighted`) mean
    /// of the candidates' positions.
    pub fn locate(&self, live: &SignalVector, k: usize, weighted: bool) -> Result<LocateResult> {
        let index = self.index.as_ref().ok_or(MargaError::IndexNotBuilt)?;

        let usable = index.sample_ids.len();
        if k == 0 || usable < k {
            return Err(MargaError::InsufficientData {
                available: usable,
                required: k.max(1),
            });
        }

        let width = index.beacons.len();
        let mut query = vec![index.missing_signal; width];
        // Live beacons never seen in calibration differ from every row equally
        let mut extra = 0.0f32;
        for (id, v) in live.iter() {
            match index.column.get(id) {
                Some(&c) => query[c] = v,
                None => {
                    let d = v - index.missing_signal;
                    extra += d * d;
                }
            }
        }

        let mut ranked: Vec<(f32, usize)> = index
            .sample_ids
            .iter()
            .enumerate()
            .map(|(row, &sample)| {
                let r = &index.rows[row * width..(row + 1) * width];
                let sq: f32 = r
                    .iter()
                    .zip(&query)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                ((sq + extra).sqrt(), sample)
            })
            .collect();

        // Stable sort keeps insertion order among equal distances
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.truncate(k);

        let candidates: Vec<WorldPoint> = ranked
            .iter()
            .map(|&(_, i)| self.samples[i].position)
            .collect();
        let distances: Vec<f32> = ranked.iter().map(|&(d, _)| d).collect();

        let position = if weighted {
            let mut sum = WorldPoint::ZERO;
            let mut total = 0.0;
            for (p, d) in candidates.iter().zip(&distances) {
                let w = 1.0 / (d + WEIGHT_EPSILON);
                sum = sum + *p * w;
                total += w;
            }
            WorldPoint::new(sum.x / total, sum.y / total)
        } else {
            let sum = candidates
                .iter()
                .fold(WorldPoint::ZERO, |acc, p| acc + *p);
            let n = candidates.len() as f32;
            WorldPoint::new(sum.x / n, sum.y / n)
        };

        debug!(
            "[Fingerprint] locate: ({:.2},{:.2}) nearest d={:.2}",
            position.x, position.y, distances[0]
        );

        Ok(LocateResult {
            position,
            candidates,
            distances,
        })
    }

    /// Save all samples as a JSON array
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.samples)?;
        info!("[Fingerprint] saved {} samples to {:?}", self.samples.len(), path);
        Ok(())
    }

    /// Load samples saved with [`FingerprintDatabase::save`]. The index is not built.
    pub fn load(path: &Path, required_samples: usize) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let samples: Vec<FingerprintSample> = serde_json::from_reader(BufReader::new(file))?;
        info!("[Fingerprint] loaded {} samples from {:?}", samples.len(), path);
        Ok(Self::from_samples(samples, required_samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(pairs: &[(&str, f32)]) -> SignalVector {
        pairs.iter().map(|(id, v)| (BeaconId::new(*id), *v)).collect()
    }

    fn three_point_db() -> FingerprintDatabase {
        let mut db = FingerprintDatabase::new(1);
        db.collect(WorldPoint::new(0.0, 0.0), None, vector(&[("a", -40.0), ("b", -80.0)]))
            .unwrap();
        db.collect(WorldPoint::new(5.0, 0.0), None, vector(&[("a", -60.0), ("b", -60.0)]))
            .unwrap();
        db.collect(WorldPoint::new(10.0, 0.0), None, vector(&[("a", -80.0), ("b", -40.0)]))
            .unwrap();
        db
    }

    #[test]
    fn test_collect_completes_position() {
        let mut db = FingerprintDatabase::new(3);
        let p = WorldPoint::new(1.0, 1.0);
        assert!(!db.collect(p, None, vector(&[("a", -50.0)])).unwrap());
        assert!(!db.collect(p, None, vector(&[("a", -51.0)])).unwrap());
        assert!(db.collect(p, None, vector(&[("a", -52.0)])).unwrap());
        assert!(db.is_complete(p));
        assert!(!db.is_complete(WorldPoint::new(2.0, 1.0)));
        assert_eq!(db.samples_at(p), 3);
    }

    #[test]
    fn test_query_requires_index() {
        let db = three_point_db();
        let result = db.locate(&vector(&[("a", -40.0)]), 1, false);
        assert!(matches!(result, Err(MargaError::IndexNotBuilt)));
    }

    #[test]
    fn test_index_built_once() {
        let mut db = three_point_db();
        db.build_index().unwrap();
        assert!(matches!(db.build_index(), Err(MargaError::IndexAlreadyBuilt)));
        assert!(matches!(
            db.collect(WorldPoint::ZERO, None, SignalVector::new()),
            Err(MargaError::IndexAlreadyBuilt)
        ));
    }

    #[test]
    fn test_nearest_neighbor() {
        let mut db = three_point_db();
        db.build_index().unwrap();

        let result = db
            .locate(&vector(&[("a", -41.0), ("b", -79.0)]), 1, false)
            .unwrap();
        assert_eq!(result.position, WorldPoint::new(0.0, 0.0));
        assert_eq!(result.candidates.len(), 1);
        assert!((result.distances[0] - 2.0f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn test_unweighted_mean() {
        let mut db = three_point_db();
        db.build_index().unwrap();

        let result = db
            .locate(&vector(&[("a", -50.0), ("b", -70.0)]), 2, false)
            .unwrap();
        assert!((result.position.x - 2.5).abs() < 1e-5);
        assert_eq!(result.candidates[0], WorldPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_weighted_pulls_toward_nearest() {
        let mut db = three_point_db();
        db.build_index().unwrap();

        let result = db
            .locate(&vector(&[("a", -45.0), ("b", -75.0)]), 2, true)
            .unwrap();
        assert!(result.position.x < 2.5);
        assert!(result.position.x > 0.0);
    }

    #[test]
    fn test_insufficient_data() {
        let mut db = three_point_db();
        db.build_index().unwrap();
        let result = db.locate(&vector(&[("a", -45.0)]), 4, false);
        assert!(matches!(
            result,
            Err(MargaError::InsufficientData {
                available: 3,
                required: 4
            })
        ));

        let mut empty = FingerprintDatabase::new(1);
        empty.build_index().unwrap();
        assert!(matches!(
            empty.locate(&SignalVector::new(), 1, false),
            Err(MargaError::InsufficientData { available: 0, .. })
        ));
    }

    #[test]
    fn test_missing_beacon_uses_sentinel() {
        let mut db = FingerprintDatabase::new(1);
        // Sample A only heard beacon "a"; sample B heard both at realistic levels
        db.collect(WorldPoint::new(0.0, 0.0), None, vector(&[("a", -60.0)]))
            .unwrap();
        db.collect(WorldPoint::new(9.0, 0.0), None, vector(&[("a", -62.0), ("b", -65.0)]))
            .unwrap();
        db.build_index().unwrap();

        // Live hears both; excluding "b" would wrongly favor sample A
        let result = db
            .locate(&vector(&[("a", -60.0), ("b", -65.0)]), 1, false)
            .unwrap();
        assert_eq!(result.position, WorldPoint::new(9.0, 0.0));
    }

    #[test]
    fn test_unknown_live_beacon_penalizes_all_equally() {
        let mut db = three_point_db();
        db.build_index().unwrap();

        let base = db.locate(&vector(&[("a", -41.0), ("b", -79.0)]), 3, false).unwrap();
        let with_extra = db
            .locate(&vector(&[("a", -41.0), ("b", -79.0), ("z", -70.0)]), 3, false)
            .unwrap();
        assert_eq!(base.candidates, with_extra.candidates);
        assert!(with_extra.distances[0] > base.distances[0]);
    }

    #[test]
    fn test_positions_first_seen_order() {
        let mut db = FingerprintDatabase::new(2);
        db.collect(WorldPoint::new(1.0, 0.0), None, vector(&[("a", -1.0)])).unwrap();
        db.collect(WorldPoint::new(0.0, 0.0), None, vector(&[("a", -1.0)])).unwrap();
        db.collect(WorldPoint::new(1.0, 0.0), None, vector(&[("a", -1.0)])).unwrap();
        assert_eq!(
            db.positions(),
            vec![WorldPoint::new(1.0, 0.0), WorldPoint::new(0.0, 0.0)]
        );
    }
}
