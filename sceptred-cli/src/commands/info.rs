use anyhow::{bail, Context, Result};
use sceptred::{codec, GridReference, TileStore, BLOB_LEN, SQUARE_SIZE, TILE_SIZE};
use std::path::PathBuf;

pub fn run(db_dir: Option<PathBuf>, reference: String) -> Result<()> {
    let reference: GridReference = reference.parse().context("Invalid grid reference")?;
    let store = super::open_store(db_dir)?;
    let tile_path = store.tile_path(&reference);

    let Some(blob) = store.get(&reference).context("Failed to read tile")? else {
        bail!("Tile not found: {}", tile_path.display());
    };
    let heights = codec::decode(&reference, &blob).context("Failed to decode tile")?;

    let extent_km = (TILE_SIZE as u32 * SQUARE_SIZE) as f64 / 1000.0;

    println!("Tile: {}", reference);
    println!("Path: {}", tile_path.display());
    println!();
    println!(
        "Grid: {}x{} samples, {}m apart ({}km square)",
        TILE_SIZE, TILE_SIZE, SQUARE_SIZE, extent_km
    );
    println!("File size: {}", super::format_size(BLOB_LEN as u64));
    println!();
    println!("Min elevation: {}m", heights.min());
    println!("Max elevation: {}m", heights.max());
    if heights.is_submerged() {
        println!("Submerged: every sample is below sea level");
    }

    Ok(())
}
