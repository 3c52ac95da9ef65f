//! Tile encoding and decoding.
//!
//! A parsed grid is narrowed to whole meters and stored as a fixed-size blob:
//!
//! - `TILE_SIZE` × `TILE_SIZE` samples (200 × 200), row-major, file-first row first
//! - each sample a 16-bit **little-endian** signed integer
//! - no header: the shape is implied by [`TILE_SIZE`], so every blob is
//!   exactly [`BLOB_LEN`] bytes
//!
//! # Narrowing
//!
//! Samples are rounded half away from zero (`2.5 → 3`, `-2.5 → -3`), then
//! clamped to `i16::MIN..=i16::MAX`. `NaN` narrows to `0`.
//!
//! # Land Policy
//!
//! With [`LandPolicy::DiscardSubmerged`] a tile whose highest sample is below
//! zero is rejected with [`TerrainError::NoLandData`]. This only saves space;
//! [`LandPolicy::KeepAll`] stores such tiles unchanged.

use serde::Serialize;

use crate::error::{Result, TerrainError};
use crate::grid::ParsedGrid;
use crate::reference::GridReference;

/// Number of samples per row/column of every tile.
pub const TILE_SIZE: usize = 200;

/// Ground distance covered by one sample, in meters.
pub const SQUARE_SIZE: u32 = 50;

/// Number of samples in a tile.
pub const SAMPLE_COUNT: usize = TILE_SIZE * TILE_SIZE;

/// Byte length of a stored tile: `TILE_SIZE` × `TILE_SIZE` × 2 bytes.
pub const BLOB_LEN: usize = SAMPLE_COUNT * 2; // 80,000 bytes

/// Number of header lines preceding the samples in an ASCII grid.
pub const HEADER_LINES: usize = 6;

/// What to do with a tile that lies entirely below datum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LandPolicy {
    /// Reject fully submerged tiles with [`TerrainError::NoLandData`].
    #[default]
    DiscardSubmerged,
    /// Keep every tile.
    KeepAll,
}

/// A full `TILE_SIZE` × `TILE_SIZE` matrix of whole-meter elevations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heights {
    /// Row-major samples, always `SAMPLE_COUNT` long.
    samples: Vec<i16>,
}

impl Heights {
    /// A tile with every sample set to `value`.
    pub fn filled(value: i16) -> Self {
        Self {
            samples: vec![value; SAMPLE_COUNT],
        }
    }

    /// Build from row-major samples.
    ///
    /// Returns `None` unless exactly `SAMPLE_COUNT` samples are given.
    pub fn from_samples(samples: Vec<i16>) -> Option<Self> {
        (samples.len() == SAMPLE_COUNT).then_some(Self { samples })
    }

    /// Sample at `row`, `col` (row 0 is the first row of the source file).
    pub fn get(&self, row: usize, col: usize) -> Option<i16> {
        if row >= TILE_SIZE || col >= TILE_SIZE {
            return None;
        }
        Some(self.samples[row * TILE_SIZE + col])
    }

    /// Flat row-major view.
    pub fn as_slice(&self) -> &[i16] {
        &self.samples
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[i16]> {
        self.samples.chunks_exact(TILE_SIZE)
    }

    /// Reshape into `TILE_SIZE` rows of `TILE_SIZE` columns.
    pub fn to_rows(&self) -> Vec<Vec<i16>> {
        self.rows().map(<[i16]>::to_vec).collect()
    }

    /// Lowest sample.
    pub fn min(&self) -> i16 {
        self.samples.iter().copied().min().unwrap_or(0)
    }

    /// Highest sample.
    pub fn max(&self) -> i16 {
        self.samples.iter().copied().max().unwrap_or(0)
    }

    /// Whether every sample lies below datum.
    pub fn is_submerged(&self) -> bool {
        self.max() < 0
    }
}

/// Narrow one floating-point sample to a whole-meter `i16`.
///
/// # Examples
///
/// ```
/// use sceptred::codec::narrow_sample;
///
/// assert_eq!(narrow_sample(2.5), 3);
/// assert_eq!(narrow_sample(-2.5), -3);
/// assert_eq!(narrow_sample(1e9), i16::MAX);
/// assert_eq!(narrow_sample(f64::NAN), 0);
/// ```
pub fn narrow_sample(value: f64) -> i16 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Narrow a parsed grid into a tile, applying the land policy.
///
/// # Errors
///
/// - [`TerrainError::ShapeMismatch`] if the grid is not `TILE_SIZE` square
/// - [`TerrainError::NoLandData`] if the policy discards submerged tiles and
///   the highest narrowed sample is negative
pub fn encode_grid(
    reference: &GridReference,
    grid: &ParsedGrid,
    policy: LandPolicy,
) -> Result<Heights> {
    grid.ensure_tile_shape()?;

    let mut samples = Vec::with_capacity(SAMPLE_COUNT);
    let mut max_value = i16::MIN;
    for value in grid.samples() {
        let narrowed = narrow_sample(value);
        max_value = max_value.max(narrowed);
        samples.push(narrowed);
    }

    if policy == LandPolicy::DiscardSubmerged && max_value < 0 {
        return Err(TerrainError::NoLandData {
            reference: reference.display(),
        });
    }

    Ok(Heights { samples })
}

/// Serialize a tile to its stored blob.
pub fn encode(heights: &Heights) -> Vec<u8> {
    let mut blob = Vec::with_capacity(BLOB_LEN);
    for sample in &heights.samples {
        blob.extend_from_slice(&sample.to_le_bytes());
    }
    blob
}

/// Deserialize a stored blob.
///
/// # Errors
///
/// Returns [`TerrainError::CorruptRecord`] unless `blob` is exactly
/// [`BLOB_LEN`] bytes.
pub fn decode(reference: &GridReference, blob: &[u8]) -> Result<Heights> {
    if blob.len() != BLOB_LEN {
        return Err(TerrainError::CorruptRecord {
            reference: reference.display(),
            len: blob.len(),
        });
    }

    let samples = blob
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok(Heights { samples })
}

/// Metadata attached to every tile returned by a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMeta {
    /// Meters per sample.
    pub square_size: u32,
    /// Uppercase grid reference, e.g. `"NT27"`.
    pub grid_reference: String,
}

/// A tile with its metadata, as returned by a lookup.
///
/// `data` is either `TILE_SIZE` rows of `TILE_SIZE` samples, or empty when the
/// store holds nothing for the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileRecord {
    pub meta: TileMeta,
    pub data: Vec<Vec<i16>>,
}

impl TileRecord {
    /// A record carrying the decoded samples.
    pub fn new(reference: &GridReference, heights: &Heights) -> Self {
        Self {
            meta: Self::meta_for(reference),
            data: heights.to_rows(),
        }
    }

    /// The "no data here" record: metadata present, no samples.
    pub fn empty(reference: &GridReference) -> Self {
        Self {
            meta: Self::meta_for(reference),
            data: Vec::new(),
        }
    }

    /// Whether this is the empty record.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn meta_for(reference: &GridReference) -> TileMeta {
        TileMeta {
            square_size: SQUARE_SIZE,
            grid_reference: reference.display(),
        }
    }
}
