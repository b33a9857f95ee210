//! Test doubles shared by the worker's test modules.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use mediasync_storage::{RemoteStore, StorageError, StorageResult, Uploaded};

/// Scriptable in-memory remote store. Records every accepted upload and can
/// be told to fail the next N uploads or uploads of specific paths.
pub struct MockRemote {
    base_url: String,
    fail_next: AtomicUsize,
    fail_paths: Mutex<HashSet<String>>,
    pub uploads: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::failing(0)
    }

    /// A remote whose next `n` uploads fail, succeeding afterwards.
    pub fn failing(n: usize) -> Self {
        Self {
            base_url: "https://cdn.example.com".to_string(),
            fail_next: AtomicUsize::new(n),
            fail_paths: Mutex::new(HashSet::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Fail every upload of `remote_path`, regardless of order.
    pub fn fail_path(&self, remote_path: &str) {
        self.fail_paths
            .lock()
            .unwrap()
            .insert(remote_path.to_string());
    }

    fn should_fail(&self, remote_path: &str) -> bool {
        if self.fail_paths.lock().unwrap().contains(remote_path) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> StorageResult<Uploaded> {
        if tokio::fs::metadata(local_path).await.is_err() {
            return Err(StorageError::LocalFileMissing(
                local_path.display().to_string(),
            ));
        }
        if self.should_fail(remote_path) {
            return Err(StorageError::UploadFailed("simulated failure".to_string()));
        }
        self.uploads.lock().unwrap().push(remote_path.to_string());
        Ok(Uploaded {
            url: self.url_for(remote_path),
        })
    }

    async fn delete_file(&self, _remote_path: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn test_connection(&self) -> bool {
        true
    }

    fn url_for(&self, remote_path: &str) -> String {
        format!("{}/{}", self.base_url, remote_path)
    }

    fn remote_path_for(&self, url: &str) -> Option<String> {
        url.strip_prefix(&format!("{}/", self.base_url))
            .map(str::to_string)
    }
}
