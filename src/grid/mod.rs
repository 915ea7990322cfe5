//! Occupancy grid of the floor plan and its file formats.

mod format;
mod storage;

pub use format::{load_grid, load_grid_file, read_grid, save_grid, write_grid};
pub use storage::{FREE, OCCUPIED, OccupancyGrid};
