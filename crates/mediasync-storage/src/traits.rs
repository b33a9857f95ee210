//! Storage abstraction trait
//!
//! All remote stores (the HTTP storage client, test doubles) implement
//! [`RemoteStore`]. Callers hold an `Arc<dyn RemoteStore>` so the reconciler
//! never couples to a concrete backend.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Storage operation errors. Expected failure modes surface here as values;
/// nothing in this crate panics past the boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Local file not found: {0}")]
    LocalFileMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Successful upload result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    /// Public pull-zone URL of the uploaded object.
    pub url: String,
}

/// Remote object storage, keyed by remote path (e.g. `media/clip.mp4`).
/// No knowledge of media semantics.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload a local file to `remote_path`. Retries internally with bounded
    /// exponential backoff; an `Err` means retries were exhausted (or the
    /// local file is missing, which is not retried).
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> StorageResult<Uploaded>;

    /// Delete the object at `remote_path`. Deleting an object that does not
    /// exist is success, which makes this safe to call from a reconciliation
    /// loop without an existence pre-check.
    async fn delete_file(&self, remote_path: &str) -> StorageResult<()>;

    /// Lightweight connectivity check against the storage root. Startup
    /// health checks only; not on the critical path.
    async fn test_connection(&self) -> bool;

    /// Public URL for a remote path under the configured pull zone.
    fn url_for(&self, remote_path: &str) -> String;

    /// Inverse of [`url_for`](Self::url_for). `None` for URLs outside the
    /// configured pull zone.
    fn remote_path_for(&self, url: &str) -> Option<String>;
}
