//! Tile lookup with decoded-tile caching.
//!
//! This module provides [`TileService`], the read path from a raw grid
//! reference to a [`TileRecord`].
//!
//! # Lookup Contract
//!
//! - A malformed reference fails with [`TerrainError::InvalidReference`].
//! - A reference with nothing stored returns [`TileRecord::empty`]; absence
//!   means "no survey data here" (sea, or never ingested) and is not an error.
//! - A stored blob of the wrong length fails with
//!   [`TerrainError::CorruptRecord`]. Corruption never reads as absence.
//!
//! ```ignore
//! use sceptred::TileServiceBuilder;
//!
//! let service = TileServiceBuilder::new("/data/sceptred/db")
//!     .cache_size(100)
//!     .build()?;
//!
//! let tile = service.lookup("nt27")?;
//! println!("{} rows for {}", tile.data.len(), tile.meta.grid_reference);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::sync::Cache;

use crate::codec::{self, Heights, TileRecord};
use crate::error::{Result, TerrainError};
use crate::reference::GridReference;
use crate::store::{DirectoryStore, TileStore};

/// Default number of decoded tiles kept in memory.
pub const DEFAULT_CACHE_SIZE: u64 = 100;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of tiles currently in the cache.
    pub entry_count: u64,
    /// Number of cache hits (requests served from cache).
    pub hit_count: u64,
    /// Number of cache misses (tiles read from the store).
    pub miss_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// A decoded tile and the store version it was decoded from.
#[derive(Clone)]
struct CachedTile {
    version: u64,
    heights: Arc<Heights>,
}

/// Read-only tile lookup over a [`TileStore`].
///
/// Decoded tiles are kept in a bounded cache, but every lookup first asks the
/// store for the key's current [`version`](TileStore::version). A cached tile
/// is served only while that version is unchanged, so a re-ingested tile is
/// visible on the next lookup and a deleted one reads as empty.
pub struct TileService {
    /// Backing store, the source of truth.
    store: Arc<dyn TileStore>,
    /// Decoded tiles keyed by reference.
    tile_cache: Cache<GridReference, CachedTile>,
    /// Number of cache hits.
    hit_count: AtomicU64,
    /// Number of cache misses.
    miss_count: AtomicU64,
}

impl TileService {
    /// Create a service over `store` caching up to `cache_size` tiles.
    ///
    /// A `cache_size` of 0 disables caching.
    pub fn new(store: Arc<dyn TileStore>, cache_size: u64) -> Self {
        Self {
            store,
            tile_cache: Cache::builder().max_capacity(cache_size).build(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    /// Create a builder for a directory-backed service.
    pub fn builder<P: AsRef<Path>>(db_dir: P) -> TileServiceBuilder {
        TileServiceBuilder::new(db_dir)
    }

    /// Look up the tile for a raw, unvalidated grid reference.
    ///
    /// # Returns
    ///
    /// - `Ok(record)` with `TILE_SIZE` rows when the tile is stored
    /// - `Ok(record)` with no rows when nothing is stored for the reference
    /// - `Err(InvalidReference)` for malformed input
    /// - `Err(CorruptRecord)` or `Err(Io)` for store faults
    ///
    /// # Example
    ///
    /// ```ignore
    /// let tile = service.lookup("NT27")?;
    /// if tile.is_empty() {
    ///     println!("No data for {}", tile.meta.grid_reference);
    /// }
    /// ```
    pub fn lookup(&self, raw_reference: &str) -> Result<TileRecord> {
        let reference = GridReference::parse(raw_reference)?;
        self.lookup_reference(&reference)
    }

    /// Look up the tile for an already validated reference.
    pub fn lookup_reference(&self, reference: &GridReference) -> Result<TileRecord> {
        match self.load_heights(reference)? {
            Some(heights) => Ok(TileRecord::new(reference, &heights)),
            None => {
                tracing::debug!(reference = %reference, "No tile stored");
                Ok(TileRecord::empty(reference))
            }
        }
    }

    /// Load the decoded samples for `reference`, from cache or store.
    pub fn load_heights(&self, reference: &GridReference) -> Result<Option<Arc<Heights>>> {
        let Some(version) = self.store.version(reference)? else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            self.tile_cache.invalidate(reference);
            return Ok(None);
        };

        if let Some(cached) = self.tile_cache.get(reference) {
            if cached.version == version {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(cached.heights));
            }
            tracing::debug!(reference = %reference, "Stored tile changed, reloading");
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let Some(blob) = self.store.get(reference)? else {
            self.tile_cache.invalidate(reference);
            return Ok(None);
        };

        let heights = match codec::decode(reference, &blob) {
            Ok(heights) => Arc::new(heights),
            Err(e) => {
                tracing::error!(reference = %reference, error = %e, "Stored tile is corrupt");
                self.tile_cache.invalidate(reference);
                return Err(e);
            }
        };

        // A put racing this read leaves the entry under the older version,
        // which the next lookup reloads.
        self.tile_cache.insert(
            *reference,
            CachedTile {
                version,
                heights: heights.clone(),
            },
        );

        Ok(Some(heights))
    }

    /// List every stored reference.
    pub fn references(&self) -> Result<Vec<GridReference>> {
        self.store.references()
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.tile_cache.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    /// Get the maximum cache size.
    pub fn cache_capacity(&self) -> u64 {
        self.tile_cache.policy().max_capacity().unwrap_or(0)
    }

    /// Drop a tile from the cache.
    pub fn invalidate_tile(&self, reference: &GridReference) {
        self.tile_cache.invalidate(reference);
    }

    /// Clear all tiles from the cache.
    pub fn clear_cache(&self) {
        self.tile_cache.invalidate_all();
    }
}

/// Builder for creating [`TileService`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use sceptred::TileServiceBuilder;
///
/// let service = TileServiceBuilder::new("/data/sceptred/db")
///     .cache_size(50)
///     .build()?;
/// ```
pub struct TileServiceBuilder {
    db_dir: PathBuf,
    cache_size: u64,
    store: Option<Arc<dyn TileStore>>,
}

impl TileServiceBuilder {
    /// Create a new builder reading tiles from `db_dir`.
    pub fn new<P: AsRef<Path>>(db_dir: P) -> Self {
        Self {
            db_dir: db_dir.as_ref().to_path_buf(),
            cache_size: DEFAULT_CACHE_SIZE,
            store: None,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `SCEPTRED_DB_DIR` | Directory of stored tiles | Required |
    /// | `SCEPTRED_CACHE_SIZE` | Maximum tiles in cache | 100 |
    ///
    /// # Errors
    ///
    /// Returns an error if `SCEPTRED_DB_DIR` is not set.
    pub fn from_env() -> Result<Self> {
        let db_dir = std::env::var("SCEPTRED_DB_DIR").map_err(|_| {
            TerrainError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "SCEPTRED_DB_DIR environment variable not set",
            ))
        })?;

        let cache_size: u64 = std::env::var("SCEPTRED_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_SIZE);

        Ok(Self {
            db_dir: PathBuf::from(db_dir),
            cache_size,
            store: None,
        })
    }

    /// Set the tile directory.
    pub fn db_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.db_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the maximum number of decoded tiles to keep in cache.
    ///
    /// Default is 100 tiles (about 8MB).
    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    /// Use `store` instead of a [`DirectoryStore`] at the tile directory.
    pub fn store(mut self, store: Arc<dyn TileStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The configured tile directory.
    pub fn get_db_dir(&self) -> &Path {
        &self.db_dir
    }

    /// Build the [`TileService`].
    ///
    /// # Errors
    ///
    /// Returns an error if the tile directory cannot be created.
    pub fn build(self) -> Result<TileService> {
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(DirectoryStore::open(&self.db_dir)?),
        };
        Ok(TileService::new(store, self.cache_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, TILE_SIZE};
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    fn reference(s: &str) -> GridReference {
        GridReference::parse(s).unwrap()
    }

    fn memory_service(cache_size: u64) -> (TileService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (TileService::new(store.clone(), cache_size), store)
    }

    #[test]
    fn test_lookup_stored_tile() {
        let (service, store) = memory_service(10);
        store
            .put(&reference("nt27"), &encode(&Heights::filled(2)))
            .unwrap();

        let tile = service.lookup("nt27").unwrap();
        assert_eq!(tile.meta.grid_reference, "NT27");
        assert_eq!(tile.meta.square_size, 50);
        assert_eq!(tile.data.len(), TILE_SIZE);
        assert!(tile.data.iter().all(|row| row.len() == TILE_SIZE));
        assert!(tile.data.iter().flatten().all(|&v| v == 2));
    }

    #[test]
    fn test_lookup_missing_is_empty() {
        let (service, _) = memory_service(10);

        let tile = service.lookup("sv00").unwrap();
        assert!(tile.is_empty());
        assert_eq!(tile.meta.grid_reference, "SV00");
        assert_eq!(tile.meta.square_size, 50);
    }

    #[test]
    fn test_lookup_invalid_reference() {
        let (service, _) = memory_service(10);

        for raw in ["xxxx", "nt2", "nt277", "", "../etc"] {
            assert!(
                matches!(
                    service.lookup(raw),
                    Err(TerrainError::InvalidReference { .. })
                ),
                "expected InvalidReference for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_lookup_corrupt_record() {
        let (service, store) = memory_service(10);
        store.put(&reference("nt27"), &[0u8; 100]).unwrap();

        match service.lookup("NT27") {
            Err(TerrainError::CorruptRecord { reference, len }) => {
                assert_eq!(reference, "NT27");
                assert_eq!(len, 100);
            }
            other => panic!("Expected CorruptRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let (service, store) = memory_service(10);
        store
            .put(&reference("NT27"), &encode(&Heights::filled(5)))
            .unwrap();

        let lower = service.lookup("nt27").unwrap();
        let upper = service.lookup("NT27").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_cache_hit() {
        let (service, store) = memory_service(10);
        store
            .put(&reference("nt27"), &encode(&Heights::filled(1)))
            .unwrap();

        service.lookup("nt27").unwrap();
        service.lookup("NT27").unwrap();

        let stats = service.cache_stats();
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_absent_tiles_not_cached() {
        let (service, store) = memory_service(10);

        assert!(service.lookup("nt27").unwrap().is_empty());

        store
            .put(&reference("nt27"), &encode(&Heights::filled(3)))
            .unwrap();
        let tile = service.lookup("nt27").unwrap();
        assert_eq!(tile.data[0][0], 3);
        assert_eq!(service.cache_stats().miss_count, 2);
    }

    #[test]
    fn test_overwritten_tile_is_reloaded() {
        let (service, store) = memory_service(10);
        let nt27 = reference("nt27");
        store.put(&nt27, &encode(&Heights::filled(1))).unwrap();
        assert_eq!(service.lookup("nt27").unwrap().data[0][0], 1);

        store.put(&nt27, &encode(&Heights::filled(9))).unwrap();
        assert_eq!(service.lookup("nt27").unwrap().data[0][0], 9);

        let stats = service.cache_stats();
        assert_eq!(stats.hit_count, 0);
        assert_eq!(stats.miss_count, 2);

        // Unchanged since the reload
        assert_eq!(service.lookup("nt27").unwrap().data[0][0], 9);
        assert_eq!(service.cache_stats().hit_count, 1);
    }

    #[test]
    fn test_overwritten_tile_is_reloaded_from_directory() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DirectoryStore::open(dir.path()).unwrap());
        let service = TileService::new(store.clone(), 10);
        let nt27 = reference("nt27");

        store.put(&nt27, &encode(&Heights::filled(1))).unwrap();
        assert_eq!(service.lookup("nt27").unwrap().data[0][0], 1);

        store.put(&nt27, &encode(&Heights::filled(9))).unwrap();
        assert_eq!(service.lookup("nt27").unwrap().data[0][0], 9);
    }

    #[test]
    fn test_removed_tile_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DirectoryStore::open(dir.path()).unwrap());
        let service = TileService::new(store.clone(), 10);
        let nt27 = reference("nt27");

        store.put(&nt27, &encode(&Heights::filled(4))).unwrap();
        assert!(!service.lookup("nt27").unwrap().is_empty());

        std::fs::remove_file(store.tile_path(&nt27)).unwrap();
        assert!(service.lookup("nt27").unwrap().is_empty());
    }

    #[test]
    fn test_invalidate_tile() {
        let (service, store) = memory_service(10);
        let nt27 = reference("nt27");
        store.put(&nt27, &encode(&Heights::filled(1))).unwrap();
        assert_eq!(service.lookup("nt27").unwrap().data[0][0], 1);

        store.put(&nt27, &encode(&Heights::filled(4))).unwrap();
        service.invalidate_tile(&nt27);
        assert_eq!(service.lookup("nt27").unwrap().data[0][0], 4);

        service.clear_cache();
        assert_eq!(service.lookup("nt27").unwrap().data[0][0], 4);
    }

    #[test]
    fn test_cache_stats_empty() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_cache_capacity() {
        let (service, _) = memory_service(25);
        assert_eq!(service.cache_capacity(), 25);
    }

    #[test]
    fn test_builder_directory_store() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        store
            .put(&reference("sk12"), &encode(&Heights::filled(120)))
            .unwrap();

        let service = TileServiceBuilder::new(dir.path())
            .cache_size(5)
            .build()
            .unwrap();

        assert_eq!(service.cache_capacity(), 5);
        assert_eq!(service.lookup("SK12").unwrap().data[10][10], 120);
        assert_eq!(service.references().unwrap(), vec![reference("sk12")]);
    }

    #[test]
    fn test_builder_with_store() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(&reference("hp40"), &encode(&Heights::filled(9)))
            .unwrap();

        let service = TileService::builder("/nonexistent/unused")
            .store(store)
            .build()
            .unwrap();
        assert_eq!(service.lookup("hp40").unwrap().data[0][0], 9);
    }

    #[test]
    fn test_from_env() {
        std::env::remove_var("SCEPTRED_DB_DIR");
        std::env::remove_var("SCEPTRED_CACHE_SIZE");
        assert!(TileServiceBuilder::from_env().is_err());

        std::env::set_var("SCEPTRED_DB_DIR", "/tmp/sceptred-db");
        let builder = TileServiceBuilder::from_env().unwrap();
        assert_eq!(builder.get_db_dir(), Path::new("/tmp/sceptred-db"));
        assert_eq!(builder.cache_size, DEFAULT_CACHE_SIZE);

        std::env::set_var("SCEPTRED_CACHE_SIZE", "7");
        let builder = TileServiceBuilder::from_env().unwrap();
        assert_eq!(builder.cache_size, 7);

        std::env::remove_var("SCEPTRED_DB_DIR");
        std::env::remove_var("SCEPTRED_CACHE_SIZE");
    }
}
