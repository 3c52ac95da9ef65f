pub mod info;
pub mod ingest;
pub mod list;
pub mod lookup;

use anyhow::{Context, Result};
use sceptred::DirectoryStore;
use std::path::PathBuf;

/// Resolve the tile directory from the flag or `SCEPTRED_DB_DIR`.
pub fn db_dir(db_dir: Option<PathBuf>) -> Result<PathBuf> {
    match db_dir {
        Some(dir) => Ok(dir),
        None => {
            let dir = std::env::var("SCEPTRED_DB_DIR").context(
                "SCEPTRED_DB_DIR environment variable not set. Use --db-dir or set SCEPTRED_DB_DIR",
            )?;
            Ok(PathBuf::from(dir))
        }
    }
}

pub fn open_store(db_dir: Option<PathBuf>) -> Result<DirectoryStore> {
    let dir = self::db_dir(db_dir)?;
    DirectoryStore::open(&dir)
        .with_context(|| format!("Failed to open tile store: {}", dir.display()))
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(80_000), "78.12 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_db_dir_flag_wins() {
        let dir = db_dir(Some(PathBuf::from("/tmp/tiles"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/tiles"));
    }
}
