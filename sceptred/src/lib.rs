//! # Sceptred - Elevation Tile Library
//!
//! Turns zipped ASCII elevation grids (one per 10km Ordnance Survey grid
//! square) into compact fixed-size tiles, stores them by grid reference, and
//! serves them back for lookup.
//!
//! ## Pipeline
//!
//! - **Parse** ([`grid`]): extract the `.asc` member of an archive and read its
//!   rows of floating-point samples
//! - **Encode** ([`codec`]): round to whole meters, narrow to `i16`, drop tiles
//!   that are entirely below sea level, and serialize to a fixed-width blob
//! - **Store** ([`store`]): keyed get/put of blobs with atomic per-key writes
//! - **Ingest** ([`ingest`]): walk an archive tree and load every tile
//! - **Lookup** ([`service`]): validate a reference, read and decode its tile
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sceptred::{DirectoryStore, IngestConfig, Ingestor, TileService};
//!
//! let store = Arc::new(DirectoryStore::open("/data/sceptred/db")?);
//!
//! // Offline: load the archive tree
//! Ingestor::new(IngestConfig::new("/data/sceptred/asc"), store.clone()).run()?;
//!
//! // Online: look up a tile
//! let service = TileService::new(store, 100);
//! let tile = service.lookup("nt27")?;
//! assert_eq!(tile.meta.grid_reference, "NT27");
//! ```
//!
//! ## Stored Tile Format
//!
//! - 200×200 samples, 50m apart, row-major in source order
//! - each sample a 16-bit little-endian signed integer, in meters
//! - no header: every blob is exactly 80,000 bytes

pub mod codec;
pub mod error;
pub mod grid;
pub mod ingest;
pub mod reference;
pub mod service;
pub mod store;

#[cfg(test)]
mod testutil;

// Re-export main types at crate root for convenience
pub use codec::{Heights, LandPolicy, TileMeta, TileRecord, BLOB_LEN, SQUARE_SIZE, TILE_SIZE};
pub use error::{Result, TerrainError};
pub use ingest::{IngestConfig, IngestStats, Ingestor, TileOutcome, TileSource};
pub use reference::GridReference;
pub use service::{CacheStats, TileService, TileServiceBuilder};
pub use store::{DirectoryStore, MemoryStore, StoredBlob, TileStore};
