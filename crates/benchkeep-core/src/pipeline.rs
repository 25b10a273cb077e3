//! Ingestion pipeline orchestration.
//!
//! Coordinates one CI run's ingestion: validation → distinct-commit filter
//! → decomposition of every raw record → one snapshot → append to the
//! [`HistoryStore`]. The pipeline itself is synchronous and performs no
//! I/O; persisting the store is the caller's (or the host crate's) job.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::decompose::decompose;
use crate::error::{HistoryError, Result};
use crate::models::{CommitDescriptor, RawBenchRecord, Snapshot};
use crate::store::HistoryStore;

/// Source of snapshot dates, in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// What to do with commits whose `distinct` flag is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistinctPolicy {
    /// Do not record merge or synthetic commits.
    #[default]
    Skip,
    /// Record every commit regardless of the flag.
    Record,
}

/// Everything one CI run hands to the pipeline.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub repo_url: String,
    pub tool_group: String,
    /// Harness tag stored on the snapshot (e.g. `go`, `cargo`).
    pub tool: String,
    pub commit: CommitDescriptor,
    pub records: Vec<RawBenchRecord>,
}

impl IngestRequest {
    pub fn validate(&self) -> Result<()> {
        if self.tool_group.trim().is_empty() {
            return Err(HistoryError::validation("tool group name is empty"));
        }
        if self.tool.trim().is_empty() {
            return Err(HistoryError::validation("tool name is empty"));
        }
        self.commit.validate()?;
        if self.records.is_empty() {
            return Err(HistoryError::validation(format!(
                "no benchmark records for commit {}",
                self.commit.id
            )));
        }
        if let Some(position) = self.records.iter().position(|r| r.name.trim().is_empty()) {
            return Err(HistoryError::validation(format!(
                "benchmark record #{} has an empty name",
                position + 1
            )));
        }
        Ok(())
    }
}

/// Outcome of one ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionResult {
    /// Whether a snapshot was appended.
    pub applied: bool,
    /// Metric entries in the appended snapshot (0 when not applied).
    pub point_count: usize,
}

impl IngestionResult {
    pub fn skipped() -> Self {
        Self {
            applied: false,
            point_count: 0,
        }
    }
}

pub struct IngestionPipeline {
    policy: DistinctPolicy,
    clock: Arc<dyn Clock>,
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new(DistinctPolicy::default())
    }
}

impl IngestionPipeline {
    pub fn new(policy: DistinctPolicy) -> Self {
        Self {
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> DistinctPolicy {
        self.policy
    }

    /// Ingest one run into the store.
    ///
    /// Validation failures leave the store untouched. A skipped
    /// non-distinct commit or an already recorded commit yields
    /// `applied = false` and no side effect.
    pub fn ingest(&self, store: &HistoryStore, request: IngestRequest) -> Result<IngestionResult> {
        request.validate()?;

        if !same_repository(store.repo_url(), &request.repo_url) {
            return Err(HistoryError::validation(format!(
                "repository '{}' does not match history of '{}'",
                request.repo_url,
                store.repo_url()
            )));
        }

        if !request.commit.is_distinct() && self.policy == DistinctPolicy::Skip {
            info!(
                commit = %request.commit.id,
                group = %request.tool_group,
                "commit is not distinct, not recording"
            );
            return Ok(IngestionResult::skipped());
        }

        if store.contains_commit(&request.tool_group, &request.commit.id) {
            info!(
                commit = %request.commit.id,
                group = %request.tool_group,
                "commit already recorded"
            );
            return Ok(IngestionResult::skipped());
        }

        let benches: Vec<_> = request.records.iter().flat_map(decompose).collect();
        let point_count = benches.len();
        debug!(
            records = request.records.len(),
            points = point_count,
            "decomposed benchmark records"
        );

        let snapshot = Snapshot {
            commit: request.commit,
            date: self.clock.now_millis(),
            tool: request.tool,
            benches,
        };

        if store.append(&request.tool_group, snapshot) {
            info!(group = %request.tool_group, points = point_count, "snapshot recorded");
            Ok(IngestionResult {
                applied: true,
                point_count,
            })
        } else {
            Ok(IngestionResult::skipped())
        }
    }
}

fn same_repository(a: &str, b: &str) -> bool {
    a.trim().trim_end_matches('/') == b.trim().trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Person;
    use chrono::DateTime;

    const REPO: &str = "https://github.com/example/l7lb";

    fn commit(id: &str, distinct: bool) -> CommitDescriptor {
        CommitDescriptor {
            author: Person::new("Dev", "dev@example.com"),
            committer: Person::new("Dev", "dev@example.com"),
            distinct,
            id: id.to_string(),
            message: "change".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2024-11-20T20:01:56-06:00").unwrap(),
            tree_id: None,
            url: format!("{REPO}/commit/{id}"),
        }
    }

    fn request(id: &str, distinct: bool) -> IngestRequest {
        IngestRequest {
            repo_url: REPO.to_string(),
            tool_group: "Go Benchmarks".to_string(),
            tool: "go".to_string(),
            commit: commit(id, distinct),
            records: vec![RawBenchRecord::new(
                "BenchmarkRouteRequest",
                3147699311u64,
                "ns/op\t  214536 B/op\t     609 allocs/op",
                "1 times\n4 procs",
            )],
        }
    }

    fn pipeline(now: i64) -> IngestionPipeline {
        IngestionPipeline::new(DistinctPolicy::Skip).with_clock(Arc::new(FixedClock(now)))
    }

    #[test]
    fn test_first_ingestion_into_empty_store() {
        let store = HistoryStore::new(REPO);
        let result = pipeline(1_000).ingest(&store, request("a1", true)).unwrap();
        assert_eq!(
            result,
            IngestionResult {
                applied: true,
                point_count: 4
            }
        );
        assert_eq!(store.groups(), vec!["Go Benchmarks".to_string()]);
        let snapshots = store.snapshots("Go Benchmarks");
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].date, 1_000);
        assert_eq!(store.last_update(), 1_000);
    }

    #[test]
    fn test_duplicate_is_noop() {
        let store = HistoryStore::new(REPO);
        pipeline(1_000).ingest(&store, request("a1", true)).unwrap();
        let second = pipeline(2_000).ingest(&store, request("a1", true)).unwrap();
        assert!(!second.applied);
        assert_eq!(second.point_count, 0);
        assert_eq!(store.snapshot_count("Go Benchmarks"), 1);
        assert_eq!(store.last_update(), 1_000);
    }

    #[test]
    fn test_non_distinct_skipped_by_default() {
        let store = HistoryStore::new(REPO);
        let result = pipeline(1_000).ingest(&store, request("m1", false)).unwrap();
        assert!(!result.applied);
        assert!(store.is_empty());
        assert_eq!(store.last_update(), 0);
    }

    #[test]
    fn test_non_distinct_recorded_when_configured() {
        let store = HistoryStore::new(REPO);
        let pipeline =
            IngestionPipeline::new(DistinctPolicy::Record).with_clock(Arc::new(FixedClock(5)));
        assert!(pipeline.ingest(&store, request("m1", false)).unwrap().applied);
    }

    #[test]
    fn test_validation_errors_leave_store_untouched() {
        let store = HistoryStore::new(REPO);

        let mut bad = request("a1", true);
        bad.commit.id.clear();
        assert!(matches!(
            pipeline(1).ingest(&store, bad),
            Err(HistoryError::Validation(_))
        ));

        let mut bad = request("a1", true);
        bad.records.clear();
        assert!(pipeline(1).ingest(&store, bad).is_err());

        let mut bad = request("a1", true);
        bad.records[0].name = " ".to_string();
        assert!(pipeline(1).ingest(&store, bad).is_err());

        let mut bad = request("a1", true);
        bad.tool_group.clear();
        assert!(pipeline(1).ingest(&store, bad).is_err());

        let mut bad = request("a1", true);
        bad.repo_url = "https://github.com/other/repo".to_string();
        assert!(pipeline(1).ingest(&store, bad).is_err());

        assert!(store.is_empty());
    }

    #[test]
    fn test_repository_trailing_slash_is_same_repository() {
        let store = HistoryStore::new(format!("{REPO}/"));
        assert!(pipeline(1).ingest(&store, request("a1", true)).unwrap().applied);
    }

    #[test]
    fn test_order_follows_ingestion() {
        let store = HistoryStore::new(REPO);
        for (i, id) in ["z9", "a1", "m5"].iter().enumerate() {
            pipeline(100 + i as i64).ingest(&store, request(id, true)).unwrap();
        }
        let ids: Vec<String> = store
            .query("Go Benchmarks", None, Some("BenchmarkRouteRequest"))
            .map(|p| p.commit.id)
            .collect();
        assert_eq!(ids, vec!["z9", "a1", "m5"]);
    }
}
