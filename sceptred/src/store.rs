//! Keyed persistence for encoded tiles.
//!
//! [`TileStore`] maps a [`GridReference`] to its blob. Two backends are
//! provided:
//!
//! - [`DirectoryStore`]: one file per tile under a root directory, laid out
//!   as `{root}/{prefix}/{key}.bin` (e.g. `db/nt/nt27.bin`)
//! - [`MemoryStore`]: a process-local map, for tests and embedding
//!
//! # Atomicity
//!
//! Readers never observe a partially written blob. `DirectoryStore` writes
//! each blob to a temporary file in the target directory and renames it over
//! the destination, so a concurrent `get` sees the old file or the new one.
//!
//! # Versions
//!
//! [`TileStore::version`] returns a token that changes whenever a key is
//! rewritten. Readers holding decoded copies compare it to decide whether
//! their copy is still current.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::UNIX_EPOCH;

use memmap2::Mmap;
use tempfile::NamedTempFile;

use crate::error::{Result, TerrainError};
use crate::reference::GridReference;

/// File extension of stored blobs in a [`DirectoryStore`].
pub const BLOB_EXTENSION: &str = "bin";

/// Permission bits of stored blobs. Readable by other users so the lookup
/// service can run under a different account than ingestion.
#[cfg(unix)]
pub const BLOB_MODE: u32 = 0o644;

/// Bytes of a stored tile, borrowed from whichever backend produced them.
pub enum StoredBlob {
    /// Memory-mapped tile file.
    Mapped(Mmap),
    /// Shared in-memory buffer.
    Shared(Arc<[u8]>),
    /// Owned buffer (used for empty files, which cannot be mapped).
    Owned(Vec<u8>),
}

impl Deref for StoredBlob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            StoredBlob::Mapped(mmap) => mmap,
            StoredBlob::Shared(bytes) => bytes,
            StoredBlob::Owned(bytes) => bytes,
        }
    }
}

impl std::fmt::Debug for StoredBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredBlob").field("len", &self.len()).finish()
    }
}

/// A keyed get/put store of tile blobs.
///
/// Implementations must be safe to read from many threads at once, and a
/// `get` racing a `put` for the same key must return either the complete old
/// blob or the complete new one.
pub trait TileStore: Send + Sync {
    /// Write or overwrite the blob for `reference`.
    fn put(&self, reference: &GridReference, blob: &[u8]) -> Result<()>;

    /// Read the blob for `reference`.
    ///
    /// Absence is `Ok(None)`, not an error.
    fn get(&self, reference: &GridReference) -> Result<Option<StoredBlob>>;

    /// Current version token for `reference`, or `None` if nothing is stored.
    ///
    /// The token changes on every `put` of the key. It says nothing about
    /// ordering between versions.
    fn version(&self, reference: &GridReference) -> Result<Option<u64>>;

    /// List every stored reference, sorted.
    fn references(&self) -> Result<Vec<GridReference>>;
}

/// A store keeping one file per tile under a root directory.
///
/// # Example
///
/// ```ignore
/// use sceptred::{DirectoryStore, GridReference, TileStore};
///
/// let store = DirectoryStore::open("/data/sceptred/db")?;
/// let reference = GridReference::parse("NT27")?;
/// if let Some(blob) = store.get(&reference)? {
///     println!("{} bytes", blob.len());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `reference`.
    pub fn tile_path(&self, reference: &GridReference) -> PathBuf {
        self.root
            .join(reference.prefix())
            .join(format!("{}.{}", reference.key(), BLOB_EXTENSION))
    }
}

impl TileStore for DirectoryStore {
    fn put(&self, reference: &GridReference, blob: &[u8]) -> Result<()> {
        let path = self.tile_path(reference);
        let dir = self.root.join(reference.prefix());
        fs::create_dir_all(&dir)?;

        // Same directory as the target so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(BLOB_MODE))?;
        }
        tmp.write_all(blob)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| TerrainError::Io(e.error))?;

        Ok(())
    }

    fn get(&self, reference: &GridReference) -> Result<Option<StoredBlob>> {
        let file = match File::open(self.tile_path(reference)) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TerrainError::Io(e)),
        };

        if file.metadata()?.len() == 0 {
            return Ok(Some(StoredBlob::Owned(Vec::new())));
        }

        // SAFETY: tile files are never modified in place. Writers replace them
        // by rename, which leaves this mapping on the old inode.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Some(StoredBlob::Mapped(mmap)))
    }

    fn version(&self, reference: &GridReference) -> Result<Option<u64>> {
        match fs::metadata(self.tile_path(reference)) {
            Ok(metadata) => Ok(Some(file_version(&metadata))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TerrainError::Io(e)),
        }
    }

    fn references(&self) -> Result<Vec<GridReference>> {
        let mut references = Vec::new();

        for prefix_dir in fs::read_dir(&self.root)?.flatten() {
            if !prefix_dir.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }

            for entry in fs::read_dir(prefix_dir.path())?.flatten() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                let Some(key) = name.strip_suffix(&format!(".{}", BLOB_EXTENSION)) else {
                    continue;
                };
                if let Ok(reference) = GridReference::parse(key) {
                    references.push(reference);
                }
            }
        }

        references.sort();
        Ok(references)
    }
}

/// Version token of a tile file.
///
/// Every `put` persists a fresh temporary file, so the inode changes along
/// with the modification time.
fn file_version(metadata: &fs::Metadata) -> u64 {
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        modified ^ metadata.ino().rotate_left(32) ^ metadata.len()
    }
    #[cfg(not(unix))]
    {
        modified ^ metadata.len()
    }
}

/// An in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tiles: RwLock<HashMap<GridReference, (u64, Arc<[u8]>)>>,
    /// Source of version tokens.
    generation: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TileStore for MemoryStore {
    fn put(&self, reference: &GridReference, blob: &[u8]) -> Result<()> {
        self.tiles
            .write()
            .map_err(|_| TerrainError::StoreLockPoisoned)?
            .insert(
                *reference,
                (
                    self.generation.fetch_add(1, Ordering::Relaxed),
                    Arc::from(blob),
                ),
            );
        Ok(())
    }

    fn get(&self, reference: &GridReference) -> Result<Option<StoredBlob>> {
        let tiles = self
            .tiles
            .read()
            .map_err(|_| TerrainError::StoreLockPoisoned)?;
        Ok(tiles
            .get(reference)
            .map(|(_, blob)| StoredBlob::Shared(blob.clone())))
    }

    fn version(&self, reference: &GridReference) -> Result<Option<u64>> {
        let tiles = self
            .tiles
            .read()
            .map_err(|_| TerrainError::StoreLockPoisoned)?;
        Ok(tiles.get(reference).map(|(version, _)| *version))
    }

    fn references(&self) -> Result<Vec<GridReference>> {
        let tiles = self
            .tiles
            .read()
            .map_err(|_| TerrainError::StoreLockPoisoned)?;
        let mut references: Vec<GridReference> = tiles.keys().copied().collect();
        references.sort();
        Ok(references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn reference(s: &str) -> GridReference {
        GridReference::parse(s).unwrap()
    }

    fn check_basic_contract(store: &dyn TileStore) {
        let nt27 = reference("NT27");

        assert!(store.get(&nt27).unwrap().is_none());
        assert!(store.version(&nt27).unwrap().is_none());

        store.put(&nt27, &[1, 2, 3]).unwrap();
        assert_eq!(&*store.get(&nt27).unwrap().unwrap(), &[1, 2, 3]);
        let first_version = store.version(&nt27).unwrap().unwrap();
        assert_eq!(store.version(&nt27).unwrap(), Some(first_version));

        // Lowercase input addresses the same key
        assert_eq!(&*store.get(&reference("nt27")).unwrap().unwrap(), &[1, 2, 3]);

        store.put(&nt27, &[9, 9]).unwrap();
        assert_eq!(&*store.get(&nt27).unwrap().unwrap(), &[9, 9]);
        assert_ne!(store.version(&nt27).unwrap(), Some(first_version));

        store.put(&reference("sk12"), &[4]).unwrap();
        store.put(&reference("hp40"), &[5]).unwrap();
        let listed: Vec<String> = store
            .references()
            .unwrap()
            .iter()
            .map(|r| r.display())
            .collect();
        assert_eq!(listed, vec!["HP40", "NT27", "SK12"]);
    }

    #[test]
    fn test_memory_store_contract() {
        check_basic_contract(&MemoryStore::new());
    }

    #[test]
    fn test_directory_store_contract() {
        let dir = TempDir::new().unwrap();
        check_basic_contract(&DirectoryStore::open(dir.path()).unwrap());
    }

    #[test]
    fn test_directory_layout() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::open(dir.path().join("db")).unwrap();

        store.put(&reference("NT27"), &[0u8; 8]).unwrap();

        let expected = dir.path().join("db").join("nt").join("nt27.bin");
        assert_eq!(store.tile_path(&reference("NT27")), expected);
        assert_eq!(fs::read(expected).unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn test_directory_store_version_changes_on_same_size_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        let nt27 = reference("nt27");

        store.put(&nt27, &[1u8; 64]).unwrap();
        let before = store.version(&nt27).unwrap();
        store.put(&nt27, &[2u8; 64]).unwrap();

        assert_ne!(store.version(&nt27).unwrap(), before);
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_store_blobs_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        let nt27 = reference("nt27");

        store.put(&nt27, &[1, 2]).unwrap();
        let mode = fs::metadata(store.tile_path(&nt27))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, BLOB_MODE);

        // Overwrites keep the mode
        store.put(&nt27, &[3, 4]).unwrap();
        let mode = fs::metadata(store.tile_path(&nt27))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, BLOB_MODE);
    }

    #[test]
    fn test_directory_store_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        let nt27 = reference("nt27");

        fs::create_dir_all(dir.path().join("nt")).unwrap();
        fs::write(store.tile_path(&nt27), b"").unwrap();

        let blob = store.get(&nt27).unwrap().unwrap();
        assert!(blob.is_empty());
    }

    #[test]
    fn test_directory_store_ignores_stray_files() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        store.put(&reference("nt27"), &[1]).unwrap();

        fs::write(dir.path().join("nt").join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("nt").join("bogus.bin"), b"x").unwrap();
        fs::write(dir.path().join("README"), b"x").unwrap();

        assert_eq!(store.references().unwrap(), vec![reference("nt27")]);
    }

    #[test]
    fn test_directory_store_reopen() {
        let dir = TempDir::new().unwrap();
        DirectoryStore::open(dir.path())
            .unwrap()
            .put(&reference("nt27"), &[7, 7])
            .unwrap();

        let reopened = DirectoryStore::open(dir.path()).unwrap();
        assert_eq!(&*reopened.get(&reference("nt27")).unwrap().unwrap(), &[7, 7]);
    }

    #[test]
    fn test_concurrent_reads_see_whole_blobs() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        let nt27 = reference("nt27");
        let old = vec![1u8; 4096];
        let new = vec![2u8; 4096];
        store.put(&nt27, &old).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..50 {
                    let blob = if i % 2 == 0 { &new } else { &old };
                    store.put(&nt27, blob).unwrap();
                }
            });

            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let blob = store.get(&nt27).unwrap().unwrap();
                        assert_eq!(blob.len(), 4096);
                        let first = blob[0];
                        assert!(first == 1 || first == 2);
                        assert!(blob.iter().all(|&b| b == first));
                    }
                });
            }
        });
    }
}
