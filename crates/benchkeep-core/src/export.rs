//! Persisted / interchange form of the history.
//!
//! [`export`] projects a [`HistoryStore`] onto [`BenchmarkData`], the
//! document read by the static chart page:
//!
//! ```text
//! {
//!   "lastUpdate": 1732154581296,
//!   "repoUrl": "https://github.com/owner/repo",
//!   "entries": {
//!     "<tool group>": [ { "commit": {…}, "date": …, "tool": "go", "benches": [ … ] } ]
//!   }
//! }
//! ```
//!
//! The document is written either as plain JSON or as a script assigning
//! it to `window.BENCHMARK_DATA`, which a static page can load with a
//! `<script>` tag. [`parse_document`] accepts both.
//!
//! Group names are kept in a `BTreeMap`, so the same store state always
//! renders to the same bytes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, Result};
use crate::models::Snapshot;
use crate::store::HistoryStore;

/// Variable name the script form assigns the document to.
pub const SCRIPT_PREFIX: &str = "window.BENCHMARK_DATA =";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkData {
    pub last_update: i64,
    pub repo_url: String,
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<Snapshot>>,
}

impl BenchmarkData {
    pub fn empty(repo_url: impl Into<String>) -> Self {
        Self {
            last_update: 0,
            repo_url: repo_url.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn snapshot_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// On-disk encoding of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Pretty-printed JSON.
    Json,
    /// `window.BENCHMARK_DATA = {…}` script.
    #[default]
    Js,
}

impl DocumentFormat {
    /// Guess the format from a file extension: `.js` is a script, anything
    /// else JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("js") => Self::Js,
            _ => Self::Json,
        }
    }
}

impl FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "js" | "javascript" => Ok(Self::Js),
            other => Err(format!("unknown document format '{other}', expected json or js")),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Js => f.write_str("js"),
        }
    }
}

/// Project the store onto its persisted document.
pub fn export(store: &HistoryStore) -> BenchmarkData {
    let entries = store
        .groups()
        .into_iter()
        .map(|name| {
            let snapshots = store
                .snapshots(&name)
                .iter()
                .map(|snapshot| Snapshot::clone(snapshot))
                .collect();
            (name, snapshots)
        })
        .collect();

    BenchmarkData {
        last_update: store.last_update(),
        repo_url: store.repo_url().to_string(),
        entries,
    }
}

/// Render the document in the given encoding, newline-terminated.
pub fn render_document(data: &BenchmarkData, format: DocumentFormat) -> Result<String> {
    let json = serde_json::to_string_pretty(data)?;
    Ok(match format {
        DocumentFormat::Json => format!("{json}\n"),
        DocumentFormat::Js => format!("{SCRIPT_PREFIX} {json}\n"),
    })
}

/// Parse a document in either encoding.
///
/// Anything that is not a readable document is
/// [`HistoryError::StoreCorruption`].
pub fn parse_document(text: &str) -> Result<BenchmarkData> {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix(SCRIPT_PREFIX) {
        body = rest.trim();
    }
    if let Some(rest) = body.strip_suffix(';') {
        body = rest.trim_end();
    }
    if body.is_empty() {
        return Err(HistoryError::corruption("document is empty"));
    }
    serde_json::from_str(body)
        .map_err(|e| HistoryError::corruption(format!("cannot parse benchmark document: {e}")))
}
