//! ASCII elevation grid parsing.
//!
//! Survey tiles are distributed as zip archives each holding one Esri ASCII
//! grid (`.asc`) member:
//!
//! ```text
//! ncols        200
//! nrows        200
//! xllcorner    320000
//! yllcorner    670000
//! cellsize     50
//! NODATA_value -9999
//! 12.3 12.9 13.4 ...
//! ```
//!
//! The header is skipped by line count only. Each following line is one row
//! of whitespace-separated samples, northernmost row first.
//!
//! # Permissive Parsing
//!
//! A token that is not a number is read as `0.0` instead of rejecting the
//! file. Malformed samples are therefore silently absorbed as sea-level
//! values; see [`parse_sample`].

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use crate::codec::{HEADER_LINES, TILE_SIZE};
use crate::error::{Result, TerrainError};

/// File extension of the elevation member inside an archive.
pub const GRID_EXTENSION: &str = ".asc";

/// A parsed grid of floating-point elevations, possibly ragged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedGrid {
    rows: Vec<Vec<f64>>,
}

impl ParsedGrid {
    /// Build a grid directly from rows.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// The parsed rows, in file order.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Iterate over all samples in row-major order.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().flat_map(|row| row.iter().copied())
    }

    /// Assert the grid is exactly `TILE_SIZE` × `TILE_SIZE`.
    ///
    /// # Errors
    ///
    /// Returns [`TerrainError::ShapeMismatch`] naming the row count and the
    /// width of the first row that is the wrong length.
    pub fn ensure_tile_shape(&self) -> Result<()> {
        let bad_row = self.rows.iter().find(|row| row.len() != TILE_SIZE);

        if self.rows.len() != TILE_SIZE || bad_row.is_some() {
            let cols = bad_row
                .or_else(|| self.rows.first())
                .map(Vec::len)
                .unwrap_or(0);
            return Err(TerrainError::ShapeMismatch {
                rows: self.rows.len(),
                cols,
            });
        }

        Ok(())
    }
}

/// Parse one sample token.
///
/// Unparseable tokens become `0.0`. Note that Rust's float grammar accepts
/// `NaN` and `inf`; those pass through here and are resolved when the tile
/// is narrowed to integers.
pub fn parse_sample(token: &str) -> f64 {
    token.parse::<f64>().unwrap_or(0.0)
}

/// Parse the text of an ASCII grid.
///
/// Skips `header_lines` lines, then turns each remaining non-blank line into
/// one row. Rows keep whatever width their line has.
///
/// # Example
///
/// ```
/// use sceptred::grid::parse_grid;
///
/// let text = "ncols 2\nnrows 2\nx 0\ny 0\ncellsize 50\nnodata -9999\n1.0 2.0\n3.0 oops\n";
/// let grid = parse_grid(text, 6);
/// assert_eq!(grid.rows(), &[vec![1.0, 2.0], vec![3.0, 0.0]]);
/// ```
pub fn parse_grid(text: &str, header_lines: usize) -> ParsedGrid {
    let rows = text
        .lines()
        .skip(header_lines)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split_whitespace().map(parse_sample).collect())
        .collect();

    ParsedGrid { rows }
}

/// Read the `.asc` member of a tile archive as text.
///
/// The first member whose name ends in `.asc` (any case) is used.
///
/// # Errors
///
/// - [`TerrainError::SourceNotFound`] if the archive does not exist
/// - [`TerrainError::MalformedArchive`] if it is not a readable zip or has no
///   `.asc` member
pub fn read_grid_member(archive_path: &Path) -> Result<String> {
    let file = match File::open(archive_path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TerrainError::SourceNotFound {
                path: archive_path.to_path_buf(),
            })
        }
        Err(e) => return Err(TerrainError::Io(e)),
    };

    let malformed = |reason: String| TerrainError::MalformedArchive {
        path: archive_path.to_path_buf(),
        reason,
    };

    let mut archive =
        ZipArchive::new(file).map_err(|e| malformed(format!("Failed to read ZIP archive: {}", e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| malformed(format!("Failed to read ZIP entry: {}", e)))?;

        if !entry.name().to_lowercase().ends_with(GRID_EXTENSION) {
            continue;
        }

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| malformed(format!("Failed to extract {}: {}", entry.name(), e)))?;

        return Ok(String::from_utf8_lossy(&contents).into_owned());
    }

    Err(malformed("No .asc file found in ZIP archive".to_string()))
}

/// Read and parse the grid inside a tile archive using the standard header length.
pub fn parse_archive(archive_path: &Path) -> Result<ParsedGrid> {
    parse_archive_with_header(archive_path, HEADER_LINES)
}

/// Read and parse the grid inside a tile archive, skipping `header_lines`.
pub fn parse_archive_with_header(archive_path: &Path, header_lines: usize) -> Result<ParsedGrid> {
    let text = read_grid_member(archive_path)?;
    Ok(parse_grid(&text, header_lines))
}
