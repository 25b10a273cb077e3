//! Error type shared by every core operation.

use thiserror::Error;

/// Failures surfaced by the ingestion and persistence path.
///
/// Duplicate commits and unparseable unit strings are *not* errors: the
/// former is reported as `applied = false`, the latter degrades to a
/// primary-only decomposition.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The commit descriptor or benchmark records are malformed.
    /// Nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The persisted document exists but cannot be read as history.
    /// It must not be overwritten.
    #[error("persisted history is corrupt: {0}")]
    StoreCorruption(String),

    /// The persisted document changed (or is locked) between load and save.
    /// The caller should reload, reapply and persist again.
    #[error("concurrent write conflict: {0}")]
    Conflict(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HistoryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::StoreCorruption(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Whether retrying the whole load → ingest → persist cycle may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type Result<T, E = HistoryError> = std::result::Result<T, E>;
