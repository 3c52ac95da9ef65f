use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Elevation tile ingestion and inspection tool
#[derive(Parser)]
#[command(name = "sceptred")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory of stored tiles
    #[arg(short, long, env = "SCEPTRED_DB_DIR", global = true)]
    db_dir: Option<PathBuf>,

    /// Maximum decoded tiles in cache
    #[arg(
        short,
        long,
        env = "SCEPTRED_CACHE_SIZE",
        default_value = "100",
        global = true
    )]
    cache_size: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every zipped grid under a source tree into the store
    Ingest {
        /// Root of the archive tree (one subdirectory per 100km square)
        #[arg(env = "SCEPTRED_SOURCE_DIR")]
        source_dir: PathBuf,

        /// Only ingest archives whose name starts with this prefix
        #[arg(short, long, env = "SCEPTRED_NAME_FILTER")]
        filter: Option<String>,

        /// Store tiles even when every sample is below sea level
        #[arg(long)]
        keep_submerged: bool,

        /// Header lines to skip in each grid
        #[arg(long, default_value_t = sceptred::codec::HEADER_LINES)]
        header_lines: usize,
    },

    /// Look up the tile for a grid reference
    Lookup {
        /// Grid reference (e.g., NT27)
        reference: String,

        /// Print the full tile as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Display information about a stored tile
    Info {
        /// Grid reference (e.g., NT27)
        reference: String,
    },

    /// List stored tiles
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sceptred=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            source_dir,
            filter,
            keep_submerged,
            header_lines,
        } => commands::ingest::run(
            cli.db_dir,
            source_dir,
            filter,
            keep_submerged,
            header_lines,
        ),
        Commands::Lookup { reference, json } => {
            commands::lookup::run(cli.db_dir, cli.cache_size, reference, json)
        }
        Commands::Info { reference } => commands::info::run(cli.db_dir, reference),
        Commands::List => commands::list::run(cli.db_dir),
    }
}
