use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use sceptred::{IngestConfig, Ingestor, LandPolicy};
use std::path::PathBuf;
use std::sync::Arc;

pub fn run(
    db_dir: Option<PathBuf>,
    source_dir: PathBuf,
    filter: Option<String>,
    keep_submerged: bool,
    header_lines: usize,
) -> Result<()> {
    let store = Arc::new(super::open_store(db_dir)?);
    let root = store.root().to_path_buf();

    let mut config = IngestConfig::new(&source_dir).header_lines(header_lines);
    if let Some(prefix) = filter {
        config = config.name_filter(prefix);
    }
    if keep_submerged {
        config = config.land_policy(LandPolicy::KeepAll);
    }

    let ingestor = Ingestor::new(config, store);
    let sources = ingestor
        .discover()
        .with_context(|| format!("Failed to scan source tree: {}", source_dir.display()))?;

    if sources.is_empty() {
        println!("No archives found in: {}", source_dir.display());
        return Ok(());
    }

    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
    );

    let stats = ingestor
        .run_sources(&sources, |source, _| {
            pb.set_message(source.reference.to_string());
            pb.inc(1);
        })
        .context("Ingestion stopped")?;

    pb.finish_with_message("done");

    println!();
    println!("Summary:");
    println!("  Archives found: {}", stats.discovered);
    println!("  Tiles stored: {}", stats.stored);
    if stats.skipped_no_land > 0 {
        println!("  No land data: {}", stats.skipped_no_land);
    }
    if stats.failed > 0 {
        println!("  Failed: {}", stats.failed);
    }
    println!("  Elapsed: {:.1}s", stats.elapsed_ms as f64 / 1000.0);
    println!("  Tile store: {}", root.display());

    Ok(())
}
