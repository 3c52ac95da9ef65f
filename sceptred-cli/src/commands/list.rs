use anyhow::{Context, Result};
use sceptred::TileStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub fn run(db_dir: Option<PathBuf>) -> Result<()> {
    let store = super::open_store(db_dir)?;
    let references = store.references().context("Failed to list tiles")?;

    if references.is_empty() {
        println!("No tiles found in: {}", store.root().display());
        return Ok(());
    }

    let mut by_prefix: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_size: u64 = 0;

    println!("{:<8} {:>12}", "TILE", "SIZE");
    println!("{}", "-".repeat(21));

    for reference in &references {
        let size = fs::metadata(store.tile_path(reference))
            .map(|m| m.len())
            .unwrap_or(0);
        total_size += size;
        *by_prefix.entry(reference.prefix().to_uppercase()).or_default() += 1;

        println!("{:<8} {:>12}", reference, super::format_size(size));
    }

    // Summary
    println!();
    println!("Summary:");
    println!("  Total tiles: {}", references.len());
    for (prefix, count) in &by_prefix {
        println!("  {}: {}", prefix, count);
    }
    println!("  Total size: {}", super::format_size(total_size));
    println!("  Tile store: {}", store.root().display());

    Ok(())
}
