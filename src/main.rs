//! # Siphon CLI
//!
//! The `siphon` binary drives the ETL pipeline. Each run processes one batch
//! from one connector start to finish; success exits 0 after printing the
//! collection statistics, any stage failure exits 1.
//!
//! ```bash
//! siphon --config ./config/siphon.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `siphon init` | Create the SQLite database and run schema migrations |
//! | `siphon sources` | List configured connectors |
//! | `siphon run <connector>` | Execute one pipeline run (posts, nvd) |
//! | `siphon stats` | Print aggregate statistics for a source |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use siphon::extract::HttpTransport;
use siphon::{config, connector, migrate, pipeline, sources, stats};

/// Siphon — a connector-driven ETL pipeline for pulling JSON HTTP APIs
/// into SQLite.
#[derive(Parser)]
#[command(
    name = "siphon",
    about = "Siphon — a connector-driven ETL pipeline for pulling JSON HTTP APIs into SQLite",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Every setting has a default, so a
    /// missing file is fine.
    #[arg(long, global = true, default_value = "./config/siphon.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database, the documents table, and its indexes.
    /// Idempotent — running it multiple times is safe.
    Init,

    /// List configured connectors.
    Sources,

    /// Execute one pipeline run for a connector.
    ///
    /// Walks connect → extract → transform → load, then prints load counts
    /// and collection statistics. Any stage failure aborts the run with
    /// exit code 1.
    Run {
        /// Connector name: `posts` or `nvd`.
        connector: String,

        /// Maximum number of extracted records to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Extract and transform only; report counts without writing to
        /// the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print aggregate statistics for a source's slice of the collection.
    Stats {
        /// Source to summarize: `posts` or `nvd`.
        #[arg(long, default_value = "posts")]
        source: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("siphon=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg);
        }
        Commands::Run {
            connector: name,
            limit,
            dry_run,
        } => {
            let connector = connector::resolve(&cfg, &name)?;
            let transport = HttpTransport::new(connector.base_url(), &cfg.http)?;
            let opts = pipeline::RunOptions { limit, dry_run };

            let outcome = pipeline::run(&cfg, connector.as_ref(), &transport, &opts).await?;

            if outcome.dry_run {
                println!("run {} (dry-run)", connector.name());
                println!("  extracted:   {}", outcome.extracted);
                println!("  transformed: {}", outcome.transformed);
                println!("  skipped:     {}", outcome.skipped);
            } else {
                println!("run {}", connector.name());
                println!("  extracted:   {}", outcome.extracted);
                println!("  transformed: {}", outcome.transformed);
                println!("  skipped:     {}", outcome.skipped);
                println!("  inserted:    {}", outcome.report.inserted);
                println!("  updated:     {}", outcome.report.updated);
                println!("  unchanged:   {}", outcome.report.unchanged);
                println!("  failed:      {}", outcome.report.failed);
                if let Some(run_stats) = &outcome.stats {
                    stats::print_stats(connector.name(), run_stats);
                }
            }
            println!("  elapsed:     {:.2}s", outcome.elapsed.as_secs_f64());
            println!("ok");
        }
        Commands::Stats { source } => {
            stats::run_stats(&cfg, &source).await?;
        }
    }

    Ok(())
}
