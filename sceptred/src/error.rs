//! Error types for the Sceptred library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while ingesting, storing or looking up tiles.
#[derive(Error, Debug)]
pub enum TerrainError {
    /// IO error when reading or writing files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The source archive does not exist.
    #[error("Source archive not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// The archive could not be read, or holds no `.asc` member.
    #[error("Malformed archive {path}: {reason}")]
    MalformedArchive { path: PathBuf, reason: String },

    /// The parsed grid is not `TILE_SIZE` × `TILE_SIZE`.
    #[error(
        "Grid shape mismatch: {rows} rows, found a row of {cols} columns (expected {n}x{n})",
        n = crate::codec::TILE_SIZE
    )]
    ShapeMismatch { rows: usize, cols: usize },

    /// Every sample in the tile lies below datum.
    #[error("No land data in tile {reference}")]
    NoLandData { reference: String },

    /// Input does not look like a grid reference (two letters, two digits).
    #[error("Invalid grid reference: {input:?}")]
    InvalidReference { input: String },

    /// Stored bytes have the wrong length for a tile.
    #[error(
        "Corrupt record for {reference}: {len} bytes (expected {expected})",
        expected = crate::codec::BLOB_LEN
    )]
    CorruptRecord { reference: String, len: usize },

    /// The in-memory store lock was poisoned by a panicking writer.
    #[error("Tile store lock was poisoned")]
    StoreLockPoisoned,
}

/// Result type alias using [`TerrainError`].
pub type Result<T> = std::result::Result<T, TerrainError>;
