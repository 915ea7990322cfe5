//! On-disk formats for the occupancy grid.
//!
//! Binary `.mgrid` format:
//! - Header (32 bytes):
//!   - Magic: "MGRID" (5 bytes)
//!   - Version: u8 (1 byte)
//!   - Width: u32 (4 bytes, little-endian)
//!   - Height: u32 (4 bytes, little-endian)
//!   - Resolution: f32 (4 bytes, little-endian)
//!   - Origin X: f32 (4 bytes, little-endian)
//!   - Origin Y: f32 (4 bytes, little-endian)
//!   - Reserved: 6 bytes
//! - Cell data: width * height bytes, row-major (0 = free, 1 = occupied)
//!
//! ASCII format: one text line per grid row, `#` occupied, `.` or space free.

use crate::core::WorldPoint;
use crate::error::{MargaError, Result};
use crate::grid::OccupancyGrid;
use crate::grid::storage::{FREE, OCCUPIED};
use std::io::{Read, Write};
use std::path::Path;

const MAGIC: &[u8; 5] = b"MGRID";
const VERSION: u8 = 1;
const HEADER_SIZE: usize = 32;

// Field offsets inside the header
const OFF_VERSION: usize = 5;
const OFF_WIDTH: usize = 6;
const OFF_HEIGHT: usize = 10;
const OFF_RESOLUTION: usize = 14;
const OFF_ORIGIN_X: usize = 18;
const OFF_ORIGIN_Y: usize = 22;

/// Decoded `.mgrid` header
struct GridHeader {
    width: usize,
    height: usize,
    resolution: f32,
    origin: WorldPoint,
}

impl GridHeader {
    fn of(grid: &OccupancyGrid) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            resolution: grid.resolution(),
            origin: grid.origin(),
        }
    }

    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..MAGIC.len()].copy_from_slice(MAGIC);
        bytes[OFF_VERSION] = VERSION;
        put(&mut bytes, OFF_WIDTH, (self.width as u32).to_le_bytes());
        put(&mut bytes, OFF_HEIGHT, (self.height as u32).to_le_bytes());
        put(&mut bytes, OFF_RESOLUTION, self.resolution.to_le_bytes());
        put(&mut bytes, OFF_ORIGIN_X, self.origin.x.to_le_bytes());
        put(&mut bytes, OFF_ORIGIN_Y, self.origin.y.to_le_bytes());
        bytes
    }

    fn decode(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(MargaError::InvalidFormat(
                "not a floor grid (bad magic)".to_string(),
            ));
        }
        let found = bytes[OFF_VERSION];
        if found != VERSION {
            return Err(MargaError::VersionMismatch {
                expected: VERSION,
                found,
            });
        }

        let resolution = f32::from_le_bytes(take(bytes, OFF_RESOLUTION));
        if resolution.is_nan() || resolution <= 0.0 {
            return Err(MargaError::InvalidFormat(format!(
                "resolution must be positive, got {}",
                resolution
            )));
        }

        Ok(Self {
            width: u32::from_le_bytes(take(bytes, OFF_WIDTH)) as usize,
            height: u32::from_le_bytes(take(bytes, OFF_HEIGHT)) as usize,
            resolution,
            origin: WorldPoint::new(
                f32::from_le_bytes(take(bytes, OFF_ORIGIN_X)),
                f32::from_le_bytes(take(bytes, OFF_ORIGIN_Y)),
            ),
        })
    }
}

#[inline]
fn put(bytes: &mut [u8; HEADER_SIZE], offset: usize, field: [u8; 4]) {
    bytes[offset..offset + 4].copy_from_slice(&field);
}

#[inline]
fn take(bytes: &[u8; HEADER_SIZE], offset: usize) -> [u8; 4] {
    [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]
}

/// Write a grid to an `.mgrid` file
pub fn save_grid(grid: &OccupancyGrid, path: &Path) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_grid(grid, &mut file)?;
    file.flush()?;
    Ok(())
}

pub fn write_grid<W: Write>(grid: &OccupancyGrid, writer: &mut W) -> Result<()> {
    writer.write_all(&GridHeader::of(grid).encode())?;
    writer.write_all(grid.cells())?;
    Ok(())
}

/// Read an `.mgrid` file
pub fn load_grid(path: &Path) -> Result<OccupancyGrid> {
    let mut file = std::io::BufReader::new(std::fs::File::open(path)?);
    read_grid(&mut file)
}

pub fn read_grid<R: Read>(reader: &mut R) -> Result<OccupancyGrid> {
    let mut bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut bytes)?;
    let header = GridHeader::decode(&bytes)?;

    let Some(count) = header.width.checked_mul(header.height) else {
        return Err(MargaError::InvalidFormat(format!(
            "grid {}x{} is too large",
            header.width, header.height
        )));
    };
    let mut cells = Vec::new();
    reader.by_ref().take(count as u64).read_to_end(&mut cells)?;
    if cells.len() != count {
        return Err(MargaError::InvalidFormat(format!(
            "cell data truncated: {} of {} bytes",
            cells.len(),
            count
        )));
    }

    OccupancyGrid::from_cells(
        header.width,
        header.height,
        header.resolution,
        header.origin,
        cells,
    )
    .ok_or_else(|| MargaError::InvalidFormat("cell data does not match header size".to_string()))
}

impl OccupancyGrid {
    /// Parse a hand-drawn floor plan.
    ///
    /// Each line is one row (first line is row 0). `#` marks an occupied
    /// cell, `.` or space a free one, so a row of spaces is a free row.
    /// Only zero-length lines are skipped. All rows must have the same width.
    pub fn from_ascii(text: &str, resolution: f32, origin: WorldPoint) -> Result<Self> {
        let rows: Vec<&str> = text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.is_empty())
            .collect();

        if rows.is_empty() {
            return Err(MargaError::InvalidFormat("Empty grid".to_string()));
        }

        let width = rows[0].chars().count();
        let mut cells = Vec::with_capacity(width * rows.len());

        for (row, line) in rows.iter().enumerate() {
            let row_width = line.chars().count();
            if row_width != width {
                return Err(MargaError::InvalidFormat(format!(
                    "Row {} has {} cells, expected {}",
                    row, row_width, width
                )));
            }
            for (col, ch) in line.chars().enumerate() {
                let cell = match ch {
                    '#' => OCCUPIED,
                    '.' | ' ' => FREE,
                    other => {
                        return Err(MargaError::InvalidFormat(format!(
                            "Unexpected character {:?} at row {}, col {}",
                            other, row, col
                        )));
                    }
                };
                cells.push(cell);
            }
        }

        OccupancyGrid::from_cells(width, rows.len(), resolution, origin, cells)
            .ok_or_else(|| MargaError::InvalidFormat("Cell data size mismatch".to_string()))
    }

    /// Render the grid in the ASCII format accepted by [`OccupancyGrid::from_ascii`].
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width() + 1) * self.height());
        for row in self.cells().chunks(self.width().max(1)) {
            for &c in row {
                out.push(if c == FREE { '.' } else { '#' });
            }
            out.push('\n');
        }
        out
    }
}

/// Load a grid file, choosing the format by extension.
///
/// `.mgrid` files carry their own resolution and origin; anything else is
/// parsed as ASCII using the supplied values.
pub fn load_grid_file(path: &Path, resolution: f32, origin: WorldPoint) -> Result<OccupancyGrid> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mgrid") => load_grid(path),
        _ => {
            let text = std::fs::read_to_string(path)?;
            OccupancyGrid::from_ascii(&text, resolution, origin)
        }
    }
}
