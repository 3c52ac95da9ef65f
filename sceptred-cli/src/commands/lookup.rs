use anyhow::{Context, Result};
use sceptred::TileServiceBuilder;
use std::path::PathBuf;

pub fn run(db_dir: Option<PathBuf>, cache_size: u64, reference: String, json: bool) -> Result<()> {
    let service = TileServiceBuilder::new(super::db_dir(db_dir)?)
        .cache_size(cache_size)
        .build()
        .context("Failed to create tile service")?;

    let record = service
        .lookup(&reference)
        .with_context(|| format!("Failed to look up {}", reference))?;

    if json {
        println!("{}", serde_json::to_string(&record)?);
        return Ok(());
    }

    println!("Grid reference: {}", record.meta.grid_reference);
    println!("Square size: {}m", record.meta.square_size);
    if record.is_empty() {
        println!("No tile stored");
    } else {
        let first = record.data.first().and_then(|row| row.first());
        println!("Rows: {}", record.data.len());
        if let Some(value) = first {
            println!("First sample: {}m", value);
        }
    }

    Ok(())
}
