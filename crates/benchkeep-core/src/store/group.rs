use std::collections::HashSet;
use std::sync::Arc;

use crate::models::Snapshot;

/// The append-only snapshot log of one tool group.
///
/// Snapshots are kept in acceptance order; `commit_ids` mirrors the ids
/// present so duplicate detection does not scan the log.
#[derive(Debug, Clone, Default)]
pub(crate) struct ToolGroup {
    snapshots: Vec<Arc<Snapshot>>,
    commit_ids: HashSet<String>,
}

impl ToolGroup {
    pub(crate) fn contains(&self, commit_id: &str) -> bool {
        self.commit_ids.contains(commit_id)
    }

    pub(crate) fn last_date(&self) -> Option<i64> {
        self.snapshots.last().map(|s| s.date)
    }

    /// Push a snapshot whose commit is not yet present.
    pub(crate) fn push(&mut self, snapshot: Snapshot) {
        self.commit_ids.insert(snapshot.commit.id.clone());
        self.snapshots.push(Arc::new(snapshot));
    }

    pub(crate) fn snapshots(&self) -> &[Arc<Snapshot>] {
        &self.snapshots
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshots.len()
    }
}
