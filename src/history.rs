//! Loading, updating and persisting the history document.
//!
//! Every mutating command follows the same cycle:
//!
//! ```text
//! backend.load() ──▶ HistoryStore::from_document ──▶ fork ──▶ pipeline.ingest
//!                                                                  │ applied?
//!                                             backend.save(loaded version) ◀──┘
//!                                                        │ ok
//!                                                  fork replaces store
//! ```
//!
//! The save carries the version that was loaded, so a concurrent writer that
//! got there first turns this run into a `Conflict` instead of silently
//! dropping its snapshot. Runs that append nothing never write.

use anyhow::{bail, Context};
use benchkeep_core::{
    export, BenchmarkData, HistoryStore, IngestRequest, IngestionPipeline, IngestionResult,
    Result,
};
use tracing::{debug, info};

use crate::backend::{DocumentBackend, DocumentVersion, FileBackend};
use crate::config::Config;

/// A store together with the document version it was built from.
pub struct History {
    pub store: HistoryStore,
    /// `None` when no document existed yet.
    pub version: Option<DocumentVersion>,
}

impl History {
    pub fn is_new(&self) -> bool {
        self.version.is_none()
    }
}

/// Outcome of one ingestion cycle.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub result: IngestionResult,
    /// Snapshots in the ingested group afterwards.
    pub snapshots: usize,
    /// Version written, when the run saved anything.
    pub version: Option<DocumentVersion>,
}

/// Load the history behind `backend`. An absent document yields an empty
/// store for `repo_url`; an unreadable one is an error and stays untouched.
pub async fn open_history(backend: &dyn DocumentBackend, repo_url: &str) -> Result<History> {
    match backend.load().await? {
        Some(loaded) => {
            let store = HistoryStore::from_document(loaded.data)?;
            debug!(
                source = %backend.describe(),
                groups = store.groups().len(),
                "history opened"
            );
            Ok(History {
                store,
                version: Some(loaded.version),
            })
        }
        None => Ok(History {
            store: HistoryStore::new(repo_url),
            version: None,
        }),
    }
}

/// Ingest `request` into an already opened history and persist it if a
/// snapshot was appended.
///
/// The snapshot is staged on a fork of the store. `history` only takes it,
/// along with the new version, once the save succeeded, so a failed save
/// leaves `history` exactly as it was.
pub async fn apply(
    backend: &dyn DocumentBackend,
    history: &mut History,
    pipeline: &IngestionPipeline,
    request: IngestRequest,
) -> Result<IngestOutcome> {
    let group = request.tool_group.clone();
    let staged = history.store.fork();
    let result = pipeline.ingest(&staged, request)?;

    if !result.applied {
        debug!(group = %group, "nothing appended, document left as is");
        return Ok(IngestOutcome {
            result,
            snapshots: history.store.snapshot_count(&group),
            version: None,
        });
    }

    let version = backend
        .save(history.version.as_ref(), &export(&staged))
        .await?;
    history.store = staged;
    history.version = Some(version.clone());

    Ok(IngestOutcome {
        result,
        snapshots: history.store.snapshot_count(&group),
        version: Some(version),
    })
}

/// Load, ingest and save in one step.
pub async fn ingest_with_backend(
    backend: &dyn DocumentBackend,
    pipeline: &IngestionPipeline,
    request: IngestRequest,
) -> Result<IngestOutcome> {
    let mut history = open_history(backend, &request.repo_url).await?;
    apply(backend, &mut history, pipeline, request).await
}

pub fn file_backend(config: &Config) -> FileBackend {
    FileBackend::new(&config.store.path, config.store.format())
}

/// Create an empty history document if none exists yet.
pub async fn run_init(config: &Config) -> anyhow::Result<()> {
    let backend = file_backend(config);

    let existing = backend
        .load()
        .await
        .with_context(|| format!("Failed to read {}", backend.describe()))?;
    if let Some(loaded) = existing {
        println!(
            "History already initialized at {} ({} snapshots).",
            backend.describe(),
            loaded.data.snapshot_count()
        );
        return Ok(());
    }

    if config.repository.url.trim().is_empty() {
        bail!("repository.url must be set to create a new history");
    }

    let version = backend
        .save(None, &BenchmarkData::empty(config.repository.url.trim()))
        .await
        .with_context(|| format!("Failed to create {}", backend.describe()))?;
    info!(version = %version, "history created");
    println!("History initialized at {}.", backend.describe());
    Ok(())
}
