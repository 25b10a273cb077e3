//! Append-only benchmark history.
//!
//! [`HistoryStore`] owns the snapshot logs of every tool group of one
//! repository. It is the explicit, owned replacement for a process-wide
//! document: callers construct it (empty or from a loaded document), hand
//! it to the ingestion pipeline by reference, and export it when done.
//!
//! # Concurrency
//!
//! ```text
//! HistoryStore
//!  ├── repo_url            (immutable)
//!  ├── last_update         AtomicI64, max-merged
//!  └── groups  RwLock<BTreeMap<name, Arc<Mutex<ToolGroup>>>>
//!                 │
//!                 ├── "Go Benchmarks"   Mutex ── [snap, snap, …]
//!                 └── "Rust Benchmarks" Mutex ── [snap, …]
//! ```
//!
//! The map lock is held only to look up or insert a group; appends then
//! serialize on the group's own mutex, so ingestion into different groups
//! does not contend.
//!
//! # Invariants
//!
//! - A group's snapshots keep acceptance order; nothing is reordered,
//!   updated or deleted.
//! - A commit id appears at most once per group.
//! - Snapshot dates are non-decreasing within a group.
//! - `last_update` is non-decreasing and ≥ every snapshot date.

mod group;

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{HistoryError, Result};
use crate::export::BenchmarkData;
use crate::decompose::bench_owners;
use crate::models::{MetricPoint, SeriesKey, Snapshot};

use group::ToolGroup;

/// Lifecycle state the store was created in. Both states accept appends
/// identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOrigin {
    /// No prior persisted document existed.
    Uninitialized,
    /// Built from a persisted document.
    Loaded,
}

#[derive(Debug)]
pub struct HistoryStore {
    repo_url: String,
    last_update: AtomicI64,
    groups: RwLock<BTreeMap<String, Arc<Mutex<ToolGroup>>>>,
    origin: StoreOrigin,
}

impl HistoryStore {
    /// Create an empty store for a repository.
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            last_update: AtomicI64::new(0),
            groups: RwLock::new(BTreeMap::new()),
            origin: StoreOrigin::Uninitialized,
        }
    }

    /// Rebuild a store from a persisted document.
    ///
    /// The document must already satisfy the store invariants; a group
    /// with out-of-order dates or a repeated commit id is reported as
    /// [`HistoryError::StoreCorruption`] rather than silently repaired.
    pub fn from_document(data: BenchmarkData) -> Result<Self> {
        let mut groups = BTreeMap::new();
        let mut max_date = i64::MIN;

        for (name, snapshots) in data.entries {
            let mut group = ToolGroup::default();
            for snapshot in snapshots {
                if group.contains(&snapshot.commit.id) {
                    return Err(HistoryError::corruption(format!(
                        "group '{}' contains commit {} more than once",
                        name, snapshot.commit.id
                    )));
                }
                if let Some(last) = group.last_date() {
                    if snapshot.date < last {
                        return Err(HistoryError::corruption(format!(
                            "group '{}' has snapshot for {} dated {} before previous {}",
                            name, snapshot.commit.id, snapshot.date, last
                        )));
                    }
                }
                max_date = max_date.max(snapshot.date);
                group.push(snapshot);
            }
            groups.insert(name, Arc::new(Mutex::new(group)));
        }

        Ok(Self {
            repo_url: data.repo_url,
            last_update: AtomicI64::new(data.last_update.max(max_date).max(0)),
            groups: RwLock::new(groups),
            origin: StoreOrigin::Loaded,
        })
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn origin(&self) -> StoreOrigin {
        self.origin
    }

    /// Epoch milliseconds of the most recent accepted snapshot.
    pub fn last_update(&self) -> i64 {
        self.last_update.load(Ordering::Acquire)
    }

    /// Append a snapshot to a tool group unless its commit is already there.
    ///
    /// Returns `false`, leaving the store untouched, for a duplicate commit
    /// id. A snapshot dated before the group's last snapshot is re-dated to
    /// that snapshot's date so the log stays ordered.
    pub fn append(&self, tool_group: &str, mut snapshot: Snapshot) -> bool {
        let group = self.group_or_insert(tool_group);
        let mut group = group.lock();

        if group.contains(&snapshot.commit.id) {
            debug!(
                group = tool_group,
                commit = %snapshot.commit.id,
                "commit already recorded, skipping"
            );
            return false;
        }

        if let Some(last) = group.last_date() {
            if snapshot.date < last {
                warn!(
                    group = tool_group,
                    commit = %snapshot.commit.id,
                    date = snapshot.date,
                    last,
                    "snapshot date precedes group history, clamping"
                );
                snapshot.date = last;
            }
        }

        let date = snapshot.date;
        group.push(snapshot);
        self.last_update.fetch_max(date, Ordering::AcqRel);

        debug!(group = tool_group, date, snapshots = group.len(), "snapshot appended");
        true
    }

    /// Points of a tool group in append order, optionally filtered.
    ///
    /// `bench_name` matches the primary series of a bench and the secondary
    /// series decomposed from it; `metric_label` matches one label exactly.
    /// The snapshot list is captured up front; points are produced lazily.
    pub fn query(
        &self,
        tool_group: &str,
        bench_name: Option<&str>,
        metric_label: Option<&str>,
    ) -> impl Iterator<Item = MetricPoint> {
        let snapshots = self.snapshots(tool_group);
        let bench_name = bench_name.map(str::to_string);
        let metric_label = metric_label.map(str::to_string);

        snapshots.into_iter().flat_map(move |snapshot| {
            let owners = bench_owners(&snapshot.benches);
            let points: Vec<MetricPoint> = snapshot
                .benches
                .iter()
                .zip(owners)
                .filter(|(entry, owner)| {
                    bench_name.as_deref().map_or(true, |bench| *owner == bench)
                        && metric_label
                            .as_deref()
                            .map_or(true, |label| entry.label == label)
                })
                .map(|(entry, _)| MetricPoint {
                    label: entry.label.clone(),
                    commit: snapshot.commit.clone(),
                    date: snapshot.date,
                    value: entry.value.clone(),
                    unit: entry.unit.clone(),
                    extra: entry.extra.clone(),
                })
                .collect();
            points.into_iter()
        })
    }

    /// Snapshots of a tool group in append order (empty for unknown groups).
    pub fn snapshots(&self, tool_group: &str) -> Vec<Arc<Snapshot>> {
        let group = self.groups.read().get(tool_group).cloned();
        match group {
            Some(group) => group.lock().snapshots().to_vec(),
            None => Vec::new(),
        }
    }

    /// Names of all tool groups, sorted.
    pub fn groups(&self) -> Vec<String> {
        self.groups.read().keys().cloned().collect()
    }

    pub fn snapshot_count(&self, tool_group: &str) -> usize {
        let group = self.groups.read().get(tool_group).cloned();
        group.map_or(0, |group| group.lock().len())
    }

    pub fn contains_commit(&self, tool_group: &str, commit_id: &str) -> bool {
        let group = self.groups.read().get(tool_group).cloned();
        group.is_some_and(|group| group.lock().contains(commit_id))
    }

    /// Distinct series of a tool group in first-seen order.
    pub fn series_keys(&self, tool_group: &str) -> Vec<SeriesKey> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for snapshot in self.snapshots(tool_group) {
            let owners = bench_owners(&snapshot.benches);
            for (entry, bench) in snapshot.benches.iter().zip(owners) {
                if seen.insert(entry.label.clone()) {
                    keys.push(SeriesKey::new(tool_group, bench, entry.label.as_str()));
                }
            }
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// An independent copy of the current state. Snapshots are shared, so
    /// this is cheap; appends to the copy never show up in `self`.
    pub fn fork(&self) -> Self {
        let groups = self
            .groups
            .read()
            .iter()
            .map(|(name, group)| (name.clone(), Arc::new(Mutex::new(group.lock().clone()))))
            .collect();
        Self {
            repo_url: self.repo_url.clone(),
            last_update: AtomicI64::new(self.last_update()),
            groups: RwLock::new(groups),
            origin: self.origin,
        }
    }

    fn group_or_insert(&self, tool_group: &str) -> Arc<Mutex<ToolGroup>> {
        if let Some(group) = self.groups.read().get(tool_group) {
            return Arc::clone(group);
        }
        let mut groups = self.groups.write();
        Arc::clone(groups.entry(tool_group.to_string()).or_default())
    }
}
