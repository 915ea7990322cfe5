//! Calibration walk: collecting fingerprints over a regular lattice of points.

use crate::config::CalibrationConfig;
use crate::core::{Direction, GridCoord, WorldPoint};
use crate::error::Result;
use tracing::{debug, info};

use super::database::FingerprintDatabase;
use super::types::{BeaconId, SignalVector};

/// Drives one calibration run.
///
/// Readings are merged into a pending vector; once it holds enough distinct
/// beacons it becomes a sample for the current point and is cleared.
#[derive(Debug)]
pub struct CalibrationSession {
    db: FingerprintDatabase,
    config: CalibrationConfig,
    current: GridCoord,
    direction: Option<Direction>,
    pending: SignalVector,
}

impl CalibrationSession {
    pub fn new(config: CalibrationConfig, db: FingerprintDatabase) -> Self {
        info!(
            "[Calibration] {}x{} points, {:.2}x{:.2}m cells",
            config.cols, config.rows, config.cell_width, config.cell_height
        );
        Self {
            db,
            config,
            current: GridCoord::new(0, 0),
            direction: None,
            pending: SignalVector::new(),
        }
    }

    /// Lattice index of the current calibration point
    pub fn current_point(&self) -> GridCoord {
        self.current
    }

    /// Metric center of a lattice point
    pub fn point_position(&self, point: GridCoord) -> WorldPoint {
        WorldPoint::new(
            self.config.origin[0] + (point.x as f32 + 0.5) * self.config.cell_width,
            self.config.origin[1] + (point.y as f32 + 0.5) * self.config.cell_height,
        )
    }

    /// Metric center of the current calibration point
    pub fn current_position(&self) -> WorldPoint {
        self.point_position(self.current)
    }

    /// Tag subsequent samples with a facing direction
    pub fn set_direction(&mut self, direction: Option<Direction>) {
        self.direction = direction;
    }

    /// Merge one conditioned reading.
    ///
    /// Returns `Some(complete)` when a sample was stored, where `complete`
    /// says whether the current point has reached the required count.
    pub fn observe(&mut self, id: BeaconId, value: f32) -> Result<Option<bool>> {
        self.pending.insert(id, value);
        if self.pending.len() < self.config.min_beacons_per_sample {
            return Ok(None);
        }

        let position = self.current_position();
        let signals = std::mem::take(&mut self.pending);
        let complete = self.db.collect(position, self.direction, signals)?;
        debug!(
            "[Calibration] sample {} at ({},{}){}",
            self.db.samples_at(position),
            self.current.x,
            self.current.y,
            if complete { " complete" } else { "" }
        );
        Ok(Some(complete))
    }

    /// Move to the next point in row-major order, wrapping at the end.
    pub fn advance(&mut self) -> GridCoord {
        let mut next = GridCoord::new(self.current.x + 1, self.current.y);
        if next.x >= self.config.cols as i32 {
            next.x = 0;
            next.y += 1;
            if next.y >= self.config.rows as i32 {
                next.y = 0;
            }
        }
        self.current = next;
        self.pending.clear();
        next
    }

    /// Database collected so far
    pub fn database(&self) -> &FingerprintDatabase {
        &self.db
    }

    /// Build the index and hand over the database.
    pub fn finish(mut self) -> Result<FingerprintDatabase> {
        self.db.build_index()?;
        info!(
            "[Calibration] finished with {} samples at {} points",
            self.db.len(),
            self.db.positions().len()
        );
        Ok(self.db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CalibrationSession {
        let config = CalibrationConfig {
            cols: 3,
            rows: 2,
            cell_width: 1.0,
            cell_height: 2.0,
            origin: [0.0, 0.0],
            min_beacons_per_sample: 2,
        };
        CalibrationSession::new(config, FingerprintDatabase::new(2))
    }

    #[test]
    fn test_sample_taken_at_min_beacons() {
        let mut s = session();
        assert_eq!(s.observe(BeaconId::new("a"), -50.0).unwrap(), None);
        assert_eq!(s.observe(BeaconId::new("b"), -60.0).unwrap(), Some(false));
        // Pending vector was cleared
        assert_eq!(s.observe(BeaconId::new("a"), -51.0).unwrap(), None);
        assert_eq!(s.observe(BeaconId::new("c"), -61.0).unwrap(), Some(true));

        assert_eq!(s.database().len(), 2);
        assert_eq!(s.database().samples()[0].position, WorldPoint::new(0.5, 1.0));
    }

    #[test]
    fn test_advance_row_major_wraps() {
        let mut s = session();
        let visited: Vec<GridCoord> = (0..6).map(|_| s.advance()).collect();
        assert_eq!(
            visited,
            vec![
                GridCoord::new(1, 0),
                GridCoord::new(2, 0),
                GridCoord::new(0, 1),
                GridCoord::new(1, 1),
                GridCoord::new(2, 1),
                GridCoord::new(0, 0),
            ]
        );
    }

    #[test]
    fn test_advance_discards_pending() {
        let mut s = session();
        s.observe(BeaconId::new("a"), -50.0).unwrap();
        s.advance();
        assert_eq!(s.observe(BeaconId::new("b"), -60.0).unwrap(), None);
    }

    #[test]
    fn test_direction_tag_and_finish() {
        let mut s = session();
        s.set_direction(Some(Direction::N));
        s.observe(BeaconId::new("a"), -50.0).unwrap();
        s.observe(BeaconId::new("b"), -60.0).unwrap();

        let db = s.finish().unwrap();
        assert!(db.is_indexed());
        assert_eq!(db.samples()[0].direction, Some(Direction::N));
    }
}
