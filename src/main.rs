//! # benchkeep CLI
//!
//! ## Usage
//!
//! ```bash
//! benchkeep --config ./config/benchkeep.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `benchkeep init` | Create an empty history document if none exists |
//! | `benchkeep ingest` | Record one CI run's benchmark results |
//! | `benchkeep export` | Write the history as `data.js` or JSON |
//! | `benchkeep query` | Print points of a group as TSV |
//! | `benchkeep stats` | Per-group snapshot and series counts |
//!
//! ## Examples
//!
//! ```bash
//! # Record a Go benchmark run for the pushed commit
//! benchkeep ingest --commit commit.json --input bench.txt --format go \
//!     --group "Go Benchmarks" --tool go
//!
//! # Follow one bench, including its B/op and allocs/op series
//! benchkeep query --group "Go Benchmarks" --bench BenchmarkRouteRequest
//! ```

use benchkeep::ingest::IngestArgs;
use benchkeep::input::InputFormat;
use benchkeep::{config, export, history, ingest, logging, query, stats};
use benchkeep_core::DocumentFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// benchkeep: append-only benchmark history for CI.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without one, the history lives at `dev/bench/data.js`.
#[derive(Parser)]
#[command(
    name = "benchkeep",
    about = "Append-only benchmark history for CI",
    version,
    long_about = "benchkeep records the benchmark results of each CI run as a snapshot keyed by \
    commit, splits compound results (ns/op, B/op, allocs/op) into separate metric series, and \
    keeps the history as a data.js document for static charts."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/benchkeep.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the history document if it does not exist.
    ///
    /// Idempotent: an existing document is left untouched.
    Init,

    /// Record one run's benchmark results.
    ///
    /// Prints `applied`, `points` and `snapshots`. A commit that is already
    /// recorded is reported as `applied: false`.
    Ingest {
        /// Commit descriptor JSON (bare, or a push event with `head_commit`).
        #[arg(long)]
        commit: PathBuf,

        /// Benchmark output file.
        #[arg(long)]
        input: PathBuf,

        /// Format of the benchmark output.
        #[arg(long, value_enum, default_value_t = InputFormat::Json)]
        format: InputFormat,

        /// Tool group to record into (defaults to `ingest.tool_group`).
        #[arg(long)]
        group: Option<String>,

        /// Tool tag stored on the snapshot (defaults to `ingest.tool`).
        #[arg(long)]
        tool: Option<String>,
    },

    /// Write the history document.
    Export {
        /// Output file. Writes to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,

        /// `json` or `js`.
        #[arg(long)]
        format: Option<DocumentFormat>,
    },

    /// Print the points of a tool group as tab-separated values.
    Query {
        #[arg(long)]
        group: String,

        /// Bench name; includes its `"<bench> - <unit>"` series.
        #[arg(long)]
        bench: Option<String>,

        /// Exact metric label.
        #[arg(long)]
        label: Option<String>,
    },

    /// Show per-group history statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging();

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            history::run_init(&cfg).await?;
        }
        Commands::Ingest {
            commit,
            input,
            format,
            group,
            tool,
        } => {
            ingest::run_ingest(
                &cfg,
                IngestArgs {
                    commit: &commit,
                    input: &input,
                    format,
                    group,
                    tool,
                },
            )
            .await?;
        }
        Commands::Export { output, format } => {
            export::run_export(&cfg, output.as_deref(), format).await?;
        }
        Commands::Query {
            group,
            bench,
            label,
        } => {
            query::run_query(&cfg, &group, bench.as_deref(), label.as_deref()).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
