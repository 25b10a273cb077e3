//! Persistence of the history document.
//!
//! The history is one external document, so this is the only place where
//! I/O and write contention happen. A [`DocumentBackend`] loads the
//! document together with its [`DocumentVersion`] and saves a new one only
//! if the stored document still has the version the caller loaded
//! (compare-and-swap). Anything else is a
//! [`HistoryError::Conflict`](benchkeep_core::HistoryError::Conflict) the
//! caller resolves by reloading and reapplying.
//!
//! | Backend | Storage | Exclusion |
//! |---------|---------|-----------|
//! | [`FileBackend`] | file on disk, written via temp file + rename | `<path>.lock` created exclusively |
//! | [`MemoryBackend`] | byte buffer | mutex |

use async_trait::async_trait;
use benchkeep_core::{
    parse_document, render_document, BenchmarkData, DocumentFormat, HistoryError, Result,
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity of one persisted revision: SHA-256 of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentVersion(String);

impl DocumentVersion {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// A parsed document and the version it was read at.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub data: BenchmarkData,
    pub version: DocumentVersion,
}

#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Human-readable location, for messages.
    fn describe(&self) -> String;

    /// Load the current document. `None` when nothing has been persisted
    /// yet; a present but unreadable document is `StoreCorruption`.
    async fn load(&self) -> Result<Option<LoadedDocument>>;

    /// Persist `data` if the stored document is still at `expected`
    /// (`None` meaning "no document yet"). Returns the new version.
    async fn save(
        &self,
        expected: Option<&DocumentVersion>,
        data: &BenchmarkData,
    ) -> Result<DocumentVersion>;
}

fn decode(bytes: &[u8]) -> Result<LoadedDocument> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| HistoryError::corruption(format!("document is not UTF-8: {e}")))?;
    Ok(LoadedDocument {
        data: parse_document(text)?,
        version: DocumentVersion::of(bytes),
    })
}

fn check_version(
    current: Option<&DocumentVersion>,
    expected: Option<&DocumentVersion>,
) -> Result<()> {
    if current == expected {
        return Ok(());
    }
    let show = |v: Option<&DocumentVersion>| v.map_or("absent".to_string(), |v| v.to_string());
    Err(HistoryError::conflict(format!(
        "document changed since it was loaded (expected {}, found {})",
        show(expected),
        show(current)
    )))
}

// ═══════════════════════════════════════════════════════════════════════
// File backend
// ═══════════════════════════════════════════════════════════════════════

/// Lock files older than this are left over from a crashed writer.
pub const DEFAULT_STALE_LOCK_AFTER: Duration = Duration::from_secs(10 * 60);

/// History document stored in a single file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    format: DocumentFormat,
    stale_lock_after: Duration,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>, format: DocumentFormat) -> Self {
        Self {
            path: path.into(),
            format,
            stale_lock_after: DEFAULT_STALE_LOCK_AFTER,
        }
    }

    /// Age after which an existing lock file is taken over.
    pub fn with_stale_lock_after(mut self, age: Duration) -> Self {
        self.stale_lock_after = age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    async fn read_current(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DocumentBackend for FileBackend {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Option<LoadedDocument>> {
        match self.read_current().await? {
            Some(bytes) => {
                let loaded = decode(&bytes)?;
                debug!(path = %self.path.display(), version = %loaded.version, "loaded history");
                Ok(Some(loaded))
            }
            None => {
                debug!(path = %self.path.display(), "no history document yet");
                Ok(None)
            }
        }
    }

    async fn save(
        &self,
        expected: Option<&DocumentVersion>,
        data: &BenchmarkData,
    ) -> Result<DocumentVersion> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;

        let _lock = LockFile::acquire(self.lock_path(), self.stale_lock_after).await?;

        let current = self.read_current().await?;
        check_version(current.as_deref().map(DocumentVersion::of).as_ref(), expected)?;

        let text = render_document(data, self.format)?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history".to_string());
        let tmp = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        tokio::fs::write(&tmp, text.as_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        let version = DocumentVersion::of(text.as_bytes());
        info!(path = %self.path.display(), version = %version, "history persisted");
        Ok(version)
    }
}

/// Exclusive lock held for the duration of a save. Removed on drop.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    async fn acquire(path: PathBuf, stale_after: Duration) -> Result<Self> {
        match Self::create(&path).await? {
            Some(lock) => return Ok(lock),
            None if !Self::is_stale(&path, stale_after).await => {
                let owner = tokio::fs::read_to_string(&path).await.unwrap_or_default();
                let owner = owner.split_whitespace().next().unwrap_or("unknown");
                warn!(lock = %path.display(), owner, "history is locked by another writer");
                return Err(HistoryError::conflict(format!(
                    "{} is held by another writer (pid {}); if no other run is active, remove the lock file",
                    path.display(),
                    owner
                )));
            }
            None => {}
        }

        warn!(lock = %path.display(), "taking over stale lock");
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Self::create(&path).await?.ok_or_else(|| {
            HistoryError::conflict(format!(
                "{} was taken by another writer",
                path.display()
            ))
        })
    }

    /// `None` when the lock file already exists.
    async fn create(path: &Path) -> Result<Option<Self>> {
        let result = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await;
        match result {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                let owner = format!("{} {}\n", std::process::id(), Uuid::new_v4());
                file.write_all(owner.as_bytes()).await?;
                Ok(Some(Self {
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_stale(path: &Path, stale_after: Duration) -> bool {
        let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            // vanished between the two calls; the retry decides
            Err(e) => return e.kind() == ErrorKind::NotFound,
        };
        modified
            .elapsed()
            .map_or(false, |age| age >= stale_after)
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Memory backend
// ═══════════════════════════════════════════════════════════════════════

/// In-memory backend for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    bytes: Mutex<Option<Vec<u8>>>,
    format: DocumentFormat,
}

impl MemoryBackend {
    pub fn new(format: DocumentFormat) -> Self {
        Self {
            bytes: Mutex::new(None),
            format,
        }
    }

    /// Start from raw document text, readable or not.
    pub fn with_contents(text: impl Into<String>, format: DocumentFormat) -> Self {
        Self {
            bytes: Mutex::new(Some(text.into().into_bytes())),
            format,
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.bytes
            .lock()
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> Result<Option<LoadedDocument>> {
        let bytes = self.bytes.lock().clone();
        bytes.as_deref().map(decode).transpose()
    }

    async fn save(
        &self,
        expected: Option<&DocumentVersion>,
        data: &BenchmarkData,
    ) -> Result<DocumentVersion> {
        let text = render_document(data, self.format)?;
        let mut bytes = self.bytes.lock();
        check_version(bytes.as_deref().map(DocumentVersion::of).as_ref(), expected)?;
        let version = DocumentVersion::of(text.as_bytes());
        *bytes = Some(text.into_bytes());
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_backend_absent_then_saved() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::new(tmp.path().join("dev/bench/data.js"), DocumentFormat::Js);
        assert!(backend.load().await.unwrap().is_none());

        let version = backend
            .save(None, &BenchmarkData::empty("https://example.com/repo"))
            .await
            .unwrap();
        let loaded = backend.load().await.unwrap().unwrap();
        assert_eq!(loaded.version, version);
        assert_eq!(loaded.data.repo_url, "https://example.com/repo");
        assert!(!backend.lock_path().exists());

        let text = std::fs::read_to_string(backend.path()).unwrap();
        assert!(text.starts_with("window.BENCHMARK_DATA = "));
    }

    #[tokio::test]
    async fn test_file_backend_detects_stale_version() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::new(tmp.path().join("data.json"), DocumentFormat::Json);
        let v1 = backend.save(None, &BenchmarkData::empty("r")).await.unwrap();

        let mut newer = BenchmarkData::empty("r");
        newer.last_update = 10;
        backend.save(Some(&v1), &newer).await.unwrap();

        let err = backend.save(Some(&v1), &BenchmarkData::empty("r")).await.unwrap_err();
        assert!(err.is_retryable());

        let err = backend.save(None, &BenchmarkData::empty("r")).await.unwrap_err();
        assert!(matches!(err, HistoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_file_backend_held_lock_conflicts() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::new(tmp.path().join("data.json"), DocumentFormat::Json);
        std::fs::write(backend.lock_path(), "other").unwrap();

        let err = backend.save(None, &BenchmarkData::empty("r")).await.unwrap_err();
        assert!(matches!(err, HistoryError::Conflict(_)));
        assert!(err.to_string().contains("remove the lock file"));
        assert!(backend.lock_path().exists());
        assert!(!backend.path().exists());
    }

    #[tokio::test]
    async fn test_file_backend_takes_over_stale_lock() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::new(tmp.path().join("data.json"), DocumentFormat::Json)
            .with_stale_lock_after(Duration::ZERO);
        std::fs::write(backend.lock_path(), "4242 crashed-writer\n").unwrap();

        backend.save(None, &BenchmarkData::empty("r")).await.unwrap();
        assert!(backend.path().exists());
        assert!(!backend.lock_path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.js");
        std::fs::write(&path, "window.BENCHMARK_DATA = {broken").unwrap();
        let backend = FileBackend::new(&path, DocumentFormat::Js);
        assert!(matches!(
            backend.load().await,
            Err(HistoryError::StoreCorruption(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_backend_cas() {
        let backend = MemoryBackend::new(DocumentFormat::Json);
        assert!(backend.load().await.unwrap().is_none());
        let v1 = backend.save(None, &BenchmarkData::empty("r")).await.unwrap();
        assert!(backend.save(None, &BenchmarkData::empty("r")).await.is_err());
        let loaded = backend.load().await.unwrap().unwrap();
        assert_eq!(loaded.version, v1);
        assert!(backend.contents().unwrap().starts_with('{'));
    }
}
