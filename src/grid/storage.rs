//! Static occupancy grid of one floor.

use crate::core::{GridCoord, WorldPoint};

/// Walkable cell
pub const FREE: u8 = 0;
/// Wall, pillar or furniture
pub const OCCUPIED: u8 = 1;

/// Free/occupied plan of a single floor, one byte per cell, row-major.
///
/// Cell `(x, y)` spans `origin + [x, x+1) * resolution` horizontally and
/// `origin + [y, y+1) * resolution` vertically. Row 0 is the top of the
/// plan, so `y` grows downward in both cells and meters.
#[derive(Clone, Debug, PartialEq)]
pub struct OccupancyGrid {
    cells: Vec<u8>,
    width: usize,
    height: usize,
    /// Meters per cell edge
    resolution: f32,
    /// Floor position of the top-left corner of cell (0, 0)
    origin: WorldPoint,
}

impl OccupancyGrid {
    /// Plan with every cell walkable
    pub fn new(width: usize, height: usize, resolution: f32, origin: WorldPoint) -> Self {
        Self {
            cells: vec![FREE; width * height],
            width,
            height,
            resolution,
            origin,
        }
    }

    /// Wrap row-major cell bytes; any non-zero byte is occupied.
    ///
    /// `None` when the buffer does not hold exactly `width * height` cells.
    pub fn from_cells(
        width: usize,
        height: usize,
        resolution: f32,
        origin: WorldPoint,
        cells: Vec<u8>,
    ) -> Option<Self> {
        if cells.len() != width * height {
            return None;
        }
        let cells = cells
            .into_iter()
            .map(|c| if c == FREE { FREE } else { OCCUPIED })
            .collect();
        Some(Self {
            cells,
            width,
            height,
            resolution,
            origin,
        })
    }

    /// Columns
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    #[inline]
    pub fn origin(&self) -> WorldPoint {
        self.origin
    }

    /// Row-major cell bytes
    #[inline]
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Cell containing a floor position. Positions left of or above the
    /// origin land on negative indices.
    #[inline]
    pub fn world_to_grid(&self, point: WorldPoint) -> GridCoord {
        let col = (point.x - self.origin.x) / self.resolution;
        let row = (point.y - self.origin.y) / self.resolution;
        GridCoord::new(col.floor() as i32, row.floor() as i32)
    }

    /// Floor position of a cell's center
    #[inline]
    pub fn grid_to_world(&self, coord: GridCoord) -> WorldPoint {
        let half = 0.5 * self.resolution;
        WorldPoint::new(
            self.origin.x + coord.x as f32 * self.resolution + half,
            self.origin.y + coord.y as f32 * self.resolution + half,
        )
    }

    #[inline]
    pub fn is_valid_coord(&self, coord: GridCoord) -> bool {
        (0..self.width as i32).contains(&coord.x) && (0..self.height as i32).contains(&coord.y)
    }

    /// Row-major offset of an on-grid cell
    #[inline]
    pub fn coord_to_index(&self, coord: GridCoord) -> Option<usize> {
        self.is_valid_coord(coord)
            .then(|| coord.y as usize * self.width + coord.x as usize)
    }

    #[inline]
    pub fn index_to_coord(&self, index: usize) -> GridCoord {
        GridCoord::new((index % self.width) as i32, (index / self.width) as i32)
    }

    /// On the plan and walkable. Off-plan cells are never free.
    #[inline]
    pub fn is_free(&self, coord: GridCoord) -> bool {
        self.coord_to_index(coord)
            .is_some_and(|i| self.cells[i] == FREE)
    }

    /// On the plan and blocked. Off-plan cells are not reported as occupied.
    #[inline]
    pub fn is_occupied(&self, coord: GridCoord) -> bool {
        self.coord_to_index(coord)
            .is_some_and(|i| self.cells[i] != FREE)
    }

    /// Mark a cell blocked or walkable. False when the cell is off the plan.
    pub fn set_occupied(&mut self, coord: GridCoord, occupied: bool) -> bool {
        let Some(i) = self.coord_to_index(coord) else {
            return false;
        };
        self.cells[i] = if occupied { OCCUPIED } else { FREE };
        true
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != FREE).count()
    }

    /// Blocked cells in row-major order
    pub fn occupied_cells(&self) -> impl Iterator<Item = GridCoord> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != FREE)
            .map(|(i, _)| self.index_to_coord(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_to_cell_and_back() {
        let grid = OccupancyGrid::new(100, 100, 0.05, WorldPoint::new(-2.5, -2.5));

        let world = WorldPoint::new(0.0, 0.0);
        let grid_coord = grid.world_to_grid(world);
        assert_eq!(grid_coord, GridCoord::new(50, 50));

        let back = grid.grid_to_world(grid_coord);
        assert!((back.x - 0.025).abs() < 1e-5);
        assert!((back.y - 0.025).abs() < 1e-5);
    }

    #[test]
    fn test_world_to_grid_floors_negative() {
        let grid = OccupancyGrid::new(10, 10, 1.0, WorldPoint::ZERO);
        assert_eq!(grid.world_to_grid(WorldPoint::new(-0.1, 0.5)), GridCoord::new(-1, 0));
        assert!(!grid.is_valid_coord(GridCoord::new(-1, 0)));
    }

    #[test]
    fn test_occupancy_access() {
        let mut grid = OccupancyGrid::new(5, 5, 1.0, WorldPoint::ZERO);
        assert!(grid.is_free(GridCoord::new(2, 2)));
        assert!(grid.set_occupied(GridCoord::new(2, 2), true));
        assert!(grid.is_occupied(GridCoord::new(2, 2)));
        assert!(!grid.is_free(GridCoord::new(2, 2)));
        assert!(!grid.set_occupied(GridCoord::new(5, 0), true));

        // Out of bounds is neither free nor occupied
        assert!(!grid.is_free(GridCoord::new(-1, 0)));
        assert!(!grid.is_occupied(GridCoord::new(-1, 0)));

        assert_eq!(grid.occupied_count(), 1);
        assert_eq!(grid.occupied_cells().collect::<Vec<_>>(), vec![GridCoord::new(2, 2)]);
    }

    #[test]
    fn test_from_cells_size_check() {
        assert!(OccupancyGrid::from_cells(2, 2, 1.0, WorldPoint::ZERO, vec![0, 1, 0]).is_none());
        let grid = OccupancyGrid::from_cells(2, 2, 1.0, WorldPoint::ZERO, vec![0, 7, 0, 0]).unwrap();
        assert_eq!(grid.cells(), &[0, 1, 0, 0]);
    }

    #[test]
    fn test_index_round_trip() {
        let grid = OccupancyGrid::new(7, 3, 1.0, WorldPoint::ZERO);
        let c = GridCoord::new(4, 2);
        let i = grid.coord_to_index(c).unwrap();
        assert_eq!(i, 2 * 7 + 4);
        assert_eq!(grid.index_to_coord(i), c);
    }
}
