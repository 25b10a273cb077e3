//! The `benchkeep ingest` command.
//!
//! Reads the commit descriptor and benchmark output produced by a CI run,
//! runs them through the [`IngestionPipeline`] against the persisted
//! history and prints a short summary:
//!
//! ```text
//! applied: true
//! points: 4
//! snapshots: 12
//! ```
//!
//! A run whose commit was already recorded (or is not distinct under the
//! `skip` policy) prints `applied: false` and leaves the document alone.

use anyhow::{bail, Context, Result};
use benchkeep_core::{HistoryError, IngestRequest, IngestionPipeline};
use std::path::Path;
use tracing::warn;

use crate::config::Config;
use crate::history::{apply, file_backend, open_history};
use crate::input::{read_commit, read_records, InputFormat};

/// Command-line overrides for one ingestion.
#[derive(Debug)]
pub struct IngestArgs<'a> {
    pub commit: &'a Path,
    pub input: &'a Path,
    pub format: InputFormat,
    pub group: Option<String>,
    pub tool: Option<String>,
}

pub fn build_pipeline(config: &Config) -> IngestionPipeline {
    IngestionPipeline::new(config.ingest.distinct)
}

pub async fn run_ingest(config: &Config, args: IngestArgs<'_>) -> Result<()> {
    let commit = read_commit(args.commit)?;
    let records = read_records(args.input, args.format)?;

    let backend = file_backend(config);
    let mut history = open_history(&backend, config.repository.url.trim())
        .await
        .with_context(|| format!("Failed to open history at {}", config.store.path.display()))?;

    let repo_url = if config.repository.url.trim().is_empty() {
        history.store.repo_url().to_string()
    } else {
        config.repository.url.trim().to_string()
    };
    if repo_url.is_empty() {
        bail!("repository.url must be set to create a new history");
    }

    let request = IngestRequest {
        repo_url,
        tool_group: args.group.unwrap_or_else(|| config.ingest.tool_group.clone()),
        tool: args.tool.unwrap_or_else(|| config.ingest.tool.clone()),
        commit,
        records,
    };

    let pipeline = build_pipeline(config);
    let outcome = match apply(&backend, &mut history, &pipeline, request).await {
        Ok(outcome) => outcome,
        Err(e @ HistoryError::Conflict(_)) => {
            warn!(error = %e, "history changed during ingestion");
            bail!("{e}\nAnother writer got to the history first; run the ingest again to retry.");
        }
        Err(e) => return Err(e).context("Ingestion failed"),
    };

    println!("applied: {}", outcome.result.applied);
    println!("points: {}", outcome.result.point_count);
    println!("snapshots: {}", outcome.snapshots);
    Ok(())
}
