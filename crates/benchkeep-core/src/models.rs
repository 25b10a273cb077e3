//! Core data models used throughout benchkeep.
//!
//! These types describe what flows through the ingestion pipeline: the
//! commit that triggered a run, the raw records the benchmark harness
//! produced, the decomposed metric entries, and the snapshots that make up
//! a tool group's history. Field order of the serialized forms follows the
//! persisted document schema exactly.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::{HistoryError, Result};

/// Author or committer of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            username: None,
        }
    }
}

/// Immutable description of the commit a benchmark run belongs to.
///
/// `distinct` marks the commit that actually triggered the run (as opposed
/// to a merge or rollup commit). It is an ingestion filter, never part of
/// the commit's identity: two descriptors with the same `id` are the same
/// commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDescriptor {
    pub author: Person,
    pub committer: Person,
    #[serde(default = "default_distinct")]
    pub distinct: bool,
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<String>,
    pub url: String,
}

fn default_distinct() -> bool {
    true
}

impl CommitDescriptor {
    pub fn author_name(&self) -> &str {
        &self.author.name
    }

    pub fn author_email(&self) -> &str {
        &self.author.email
    }

    pub fn committer_name(&self) -> &str {
        &self.committer.name
    }

    pub fn committer_email(&self) -> &str {
        &self.committer.email
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Check the fields ingestion relies on.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(HistoryError::validation("commit id is empty"));
        }
        if self.id.chars().any(char::is_whitespace) {
            return Err(HistoryError::validation(format!(
                "commit id '{}' contains whitespace",
                self.id
            )));
        }
        if self.url.trim().is_empty() {
            return Err(HistoryError::validation(format!(
                "commit {} has no url",
                self.id
            )));
        }
        if self.author.name.trim().is_empty() {
            return Err(HistoryError::validation(format!(
                "commit {} has no author name",
                self.id
            )));
        }
        if self.committer.name.trim().is_empty() {
            return Err(HistoryError::validation(format!(
                "commit {} has no committer name",
                self.id
            )));
        }
        Ok(())
    }
}

/// One benchmark result as reported by the harness, untyped at the boundary.
///
/// `unit` is free text and may encode several measurements at once, e.g.
/// `"ns/op\t  214536 B/op\t     609 allocs/op"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBenchRecord {
    pub name: String,
    pub value: Number,
    pub unit: String,
    #[serde(default)]
    pub extra: String,
}

impl RawBenchRecord {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<Number>,
        unit: impl Into<String>,
        extra: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: unit.into(),
            extra: extra.into(),
        }
    }

    /// Build a record from a float measurement, rejecting NaN and infinities.
    pub fn from_f64(
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        extra: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let value = finite_number(value)
            .ok_or_else(|| HistoryError::validation(format!("benchmark '{name}' value is not finite")))?;
        Ok(Self {
            name,
            value,
            unit: unit.into(),
            extra: extra.into(),
        })
    }
}

/// Convert a float to a JSON number, keeping integral values integral.
pub fn finite_number(value: f64) -> Option<Number> {
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        return Some(Number::from(value as i64));
    }
    Number::from_f64(value)
}

/// One element of a decomposed record: a single named measurement.
///
/// Serialized as an item of a snapshot's `benches` array, where the label
/// is written as `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    #[serde(rename = "name")]
    pub label: String,
    pub value: Number,
    pub unit: String,
    #[serde(default)]
    pub extra: String,
}

/// All metric entries produced by one commit's run, appended atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub commit: CommitDescriptor,
    /// Epoch milliseconds at which the snapshot was recorded.
    pub date: i64,
    pub tool: String,
    pub benches: Vec<MetricEntry>,
}

/// One observation of a metric series, as returned by store queries.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub label: String,
    pub commit: CommitDescriptor,
    pub date: i64,
    pub value: Number,
    pub unit: String,
    pub extra: String,
}

impl MetricPoint {
    pub fn value_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }
}

/// Identity of a metric series within the history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub tool_group: String,
    pub bench_name: String,
    pub metric_label: String,
}

/// Separator between a bench name and the unit of a secondary metric.
pub const LABEL_SEPARATOR: &str = " - ";

impl SeriesKey {
    pub fn new(
        tool_group: impl Into<String>,
        bench_name: impl Into<String>,
        metric_label: impl Into<String>,
    ) -> Self {
        Self {
            tool_group: tool_group.into(),
            bench_name: bench_name.into(),
            metric_label: metric_label.into(),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.bench_name == self.metric_label
    }
}
