//! Batch ingestion of survey archives into a [`TileStore`].
//!
//! The source tree holds one directory per 100km square prefix, each holding
//! one zip archive per tile:
//!
//! ```text
//! {source_dir}/
//!   nt/
//!     nt27_OST50GRID_20170713.zip
//!     nt28_OST50GRID_20170713.zip
//!   sk/
//!     sk12_OST50GRID_20170713.zip
//! ```
//!
//! Each archive is parsed, narrowed and written under its grid reference.
//! Failures are isolated per tile: a missing or malformed archive, a grid of
//! the wrong shape, or a fully submerged tile is logged and skipped. Only a
//! failing store write stops the run.
//!
//! Archives are processed in parallel on the rayon thread pool (sized by
//! `RAYON_NUM_THREADS`); each writes only its own key.
//!
//! Re-running overwrites existing keys.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::codec::{self, Heights, LandPolicy, HEADER_LINES};
use crate::error::{Result, TerrainError};
use crate::grid::parse_archive_with_header;
use crate::reference::{reference_from_filename, GridReference};
use crate::store::TileStore;

/// Configuration for an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Root of the archive tree.
    pub source_dir: PathBuf,
    /// Only ingest archives whose filename starts with this (case-insensitive).
    pub name_filter: Option<String>,
    /// Header lines to skip in each grid.
    pub header_lines: usize,
    /// Whether fully submerged tiles are stored.
    pub land_policy: LandPolicy,
}

impl IngestConfig {
    /// Configuration with defaults for everything but the source directory.
    pub fn new<P: AsRef<Path>>(source_dir: P) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            name_filter: None,
            header_lines: HEADER_LINES,
            land_policy: LandPolicy::default(),
        }
    }

    /// Configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `SCEPTRED_SOURCE_DIR` | Root of the archive tree | Required |
    /// | `SCEPTRED_NAME_FILTER` | Filename prefix filter | None |
    ///
    /// # Errors
    ///
    /// Returns an error if `SCEPTRED_SOURCE_DIR` is not set.
    pub fn from_env() -> Result<Self> {
        let source_dir = std::env::var("SCEPTRED_SOURCE_DIR").map_err(|_| {
            TerrainError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "SCEPTRED_SOURCE_DIR environment variable not set",
            ))
        })?;

        let name_filter = std::env::var("SCEPTRED_NAME_FILTER")
            .ok()
            .filter(|s| !s.is_empty());

        Ok(Self {
            name_filter,
            ..Self::new(source_dir)
        })
    }

    /// Restrict ingestion to filenames starting with `prefix`.
    pub fn name_filter(mut self, prefix: impl Into<String>) -> Self {
        self.name_filter = Some(prefix.into());
        self
    }

    /// Override the number of header lines.
    pub fn header_lines(mut self, lines: usize) -> Self {
        self.header_lines = lines;
        self
    }

    /// Override the land policy.
    pub fn land_policy(mut self, policy: LandPolicy) -> Self {
        self.land_policy = policy;
        self
    }

    fn matches_filter(&self, filename: &str) -> bool {
        match &self.name_filter {
            Some(prefix) => filename
                .to_lowercase()
                .starts_with(&prefix.to_lowercase()),
            None => true,
        }
    }
}

/// One archive found in the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSource {
    pub reference: GridReference,
    pub path: PathBuf,
}

/// What happened to a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOutcome {
    /// Encoded and written to the store.
    Stored,
    /// Entirely below datum and discarded by the land policy.
    SkippedNoLand,
    /// Could not be read or parsed; skipped.
    Failed,
}

/// Statistics from an ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    /// Number of archives found.
    pub discovered: u64,
    /// Number of tiles written.
    pub stored: u64,
    /// Number of submerged tiles discarded.
    pub skipped_no_land: u64,
    /// Number of archives that failed to read or parse.
    pub failed: u64,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

/// Batch loader from an archive tree into a store.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use sceptred::{DirectoryStore, IngestConfig, Ingestor};
///
/// let store = Arc::new(DirectoryStore::open("/data/sceptred/db")?);
/// let ingestor = Ingestor::new(IngestConfig::new("/data/sceptred/asc"), store);
/// let stats = ingestor.run()?;
/// println!("Stored {} tiles in {}ms", stats.stored, stats.elapsed_ms);
/// ```
pub struct Ingestor {
    config: IngestConfig,
    store: Arc<dyn TileStore>,
}

impl Ingestor {
    /// Create an ingestor writing into `store`.
    pub fn new(config: IngestConfig, store: Arc<dyn TileStore>) -> Self {
        Self { config, store }
    }

    /// The run configuration.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Find every archive in the source tree, sorted by path.
    ///
    /// Archives whose name does not start with a valid grid reference are
    /// logged and left out.
    ///
    /// # Errors
    ///
    /// Returns [`TerrainError::SourceNotFound`] if the source directory does
    /// not exist.
    pub fn discover(&self) -> Result<Vec<TileSource>> {
        let root = &self.config.source_dir;
        if !root.is_dir() {
            return Err(TerrainError::SourceNotFound { path: root.clone() });
        }

        let mut prefix_dirs: Vec<PathBuf> = fs::read_dir(root)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        prefix_dirs.sort();

        let mut sources = Vec::new();
        for dir in prefix_dirs {
            let mut archives: Vec<PathBuf> = fs::read_dir(&dir)?
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_file())
                .collect();
            archives.sort();

            for path in archives {
                let Some(filename) = path.file_name().map(|n| n.to_string_lossy().into_owned())
                else {
                    continue;
                };
                if !filename.to_lowercase().ends_with(".zip") || !self.config.matches_filter(&filename)
                {
                    continue;
                }

                match reference_from_filename(&filename) {
                    Ok(reference) => sources.push(TileSource { reference, path }),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Ignoring archive");
                    }
                }
            }
        }

        Ok(sources)
    }

    /// Parse and narrow one archive without writing it.
    pub fn encode_source(&self, source: &TileSource) -> Result<Heights> {
        let grid = parse_archive_with_header(&source.path, self.config.header_lines)?;
        codec::encode_grid(&source.reference, &grid, self.config.land_policy)
    }

    /// Ingest one archive.
    ///
    /// Read, parse and land-policy failures are logged and reported as an
    /// outcome.
    ///
    /// # Errors
    ///
    /// Only a failing store write is returned as an error.
    pub fn ingest_tile(&self, source: &TileSource) -> Result<TileOutcome> {
        let heights = match self.encode_source(source) {
            Ok(heights) => heights,
            Err(TerrainError::NoLandData { .. }) => {
                tracing::info!(reference = %source.reference, "No land data, skipping");
                return Ok(TileOutcome::SkippedNoLand);
            }
            Err(e) => {
                tracing::warn!(
                    reference = %source.reference,
                    path = %source.path.display(),
                    error = %e,
                    "Skipping tile"
                );
                return Ok(TileOutcome::Failed);
            }
        };

        self.store.put(&source.reference, &codec::encode(&heights))?;
        tracing::debug!(reference = %source.reference, max = heights.max(), "Stored tile");

        Ok(TileOutcome::Stored)
    }

    /// Ingest the whole source tree.
    pub fn run(&self) -> Result<IngestStats> {
        self.run_with(|_, _| {})
    }

    /// Ingest the whole source tree, calling `on_tile` after each archive.
    pub fn run_with<F>(&self, on_tile: F) -> Result<IngestStats>
    where
        F: Fn(&TileSource, TileOutcome) + Sync,
    {
        let sources = self.discover()?;
        self.run_sources(&sources, on_tile)
    }

    /// Ingest already discovered `sources` in parallel.
    ///
    /// `on_tile` runs on worker threads as each archive finishes, in no fixed
    /// order. A store write failure stops the run and is returned.
    pub fn run_sources<F>(&self, sources: &[TileSource], on_tile: F) -> Result<IngestStats>
    where
        F: Fn(&TileSource, TileOutcome) + Sync,
    {
        let start = Instant::now();

        let outcomes = sources
            .par_iter()
            .map(|source| -> Result<TileOutcome> {
                let outcome = self.ingest_tile(source)?;
                on_tile(source, outcome);
                Ok(outcome)
            })
            .collect::<Result<Vec<TileOutcome>>>()?;

        let mut stats = IngestStats {
            discovered: sources.len() as u64,
            ..IngestStats::default()
        };
        for outcome in outcomes {
            match outcome {
                TileOutcome::Stored => stats.stored += 1,
                TileOutcome::SkippedNoLand => stats.skipped_no_land += 1,
                TileOutcome::Failed => stats.failed += 1,
            }
        }
        stats.elapsed_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            discovered = stats.discovered,
            stored = stats.stored,
            skipped_no_land = stats.skipped_no_land,
            failed = stats.failed,
            elapsed_ms = stats.elapsed_ms,
            "Ingestion complete"
        );

        Ok(stats)
    }
}
