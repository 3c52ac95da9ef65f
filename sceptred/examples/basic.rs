//! Basic example: ingest an archive tree, then look up a few tiles.
//!
//! Run with: cargo run --example basic -- /path/to/asc /path/to/db

use sceptred::{DirectoryStore, IngestConfig, Ingestor, TerrainError, TileService};
use std::env;
use std::sync::Arc;

fn main() -> Result<(), TerrainError> {
    let mut args = env::args().skip(1);
    let (Some(source_dir), Some(db_dir)) = (args.next(), args.next()) else {
        eprintln!("Usage: cargo run --example basic -- /path/to/asc /path/to/db");
        std::process::exit(1);
    };

    let store = Arc::new(DirectoryStore::open(&db_dir)?);

    let stats = Ingestor::new(IngestConfig::new(&source_dir), store.clone()).run()?;
    println!(
        "Ingested {} of {} archives ({} submerged, {} failed) in {}ms",
        stats.stored, stats.discovered, stats.skipped_no_land, stats.failed, stats.elapsed_ms
    );

    let service = TileService::new(store, 10);

    let squares = [
        ("Edinburgh", "nt27"),
        ("Ben Nevis", "nn17"),
        ("Scilly", "sv80"),
    ];

    println!("\nTile lookups:");
    println!("{:-<50}", "");

    for (name, reference) in &squares {
        match service.lookup(reference) {
            Ok(record) if record.is_empty() => {
                println!("{} ({}): no tile stored", name, record.meta.grid_reference);
            }
            Ok(record) => {
                let peak = record.data.iter().flatten().max().copied().unwrap_or(0);
                println!("{} ({}): highest sample {}m", name, record.meta.grid_reference, peak);
            }
            Err(e) => println!("{}: error - {}", name, e),
        }
    }

    let stats = service.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached tiles: {}", stats.entry_count);
    println!("  Hits: {}", stats.hit_count);
    println!("  Misses: {}", stats.miss_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
