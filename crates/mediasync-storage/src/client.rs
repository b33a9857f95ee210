//! HTTP storage client with bounded retries.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use mediasync_core::config::CdnSettings;

use crate::traits::{RemoteStore, StorageError, StorageResult, Uploaded};

const MAX_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retrying client for a storage-zone HTTP API: objects are PUT and DELETEd
/// at `{storage_url}/{storage_zone}/{remote_path}` with an `AccessKey`
/// header, and served publicly through the pull zone.
#[derive(Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    settings: CdnSettings,
    max_retries: u32,
    initial_retry_delay: Duration,
}

impl StorageClient {
    pub fn new(settings: CdnSettings) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            settings,
            max_retries: MAX_RETRIES,
            initial_retry_delay: INITIAL_RETRY_DELAY,
        })
    }

    /// Construct a client only when the credential triple is present.
    /// Missing configuration disables mirroring rather than erroring.
    pub fn from_settings(settings: Option<CdnSettings>) -> Option<Self> {
        match settings {
            Some(settings) => match Self::new(settings) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to construct storage client");
                    None
                }
            },
            None => {
                tracing::warn!("CDN storage configuration incomplete; mirroring disabled");
                None
            }
        }
    }

    /// Override the retry schedule. Production uses the defaults; tests use
    /// millisecond delays.
    pub fn with_retry_policy(mut self, max_retries: u32, initial_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_retry_delay = initial_delay;
        self
    }

    fn object_url(&self, remote_path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.settings.storage_url, self.settings.storage_zone, remote_path
        )
    }

    async fn put_object(&self, remote_path: &str, body: Vec<u8>) -> Result<(), String> {
        let response = self
            .http
            .put(self.object_url(remote_path))
            .header("AccessKey", &self.settings.access_key)
            .header("Content-Type", "application/octet-stream")
            .header("Content-Length", body.len())
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        match response.status().as_u16() {
            200 | 201 => Ok(()),
            status => Err(format!("Unexpected response status: {}", status)),
        }
    }

    async fn delete_object(&self, remote_path: &str) -> Result<(), String> {
        let response = self
            .http
            .delete(self.object_url(remote_path))
            .header("AccessKey", &self.settings.access_key)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        match response.status().as_u16() {
            // 404 means the object is already gone, which is the desired
            // end state.
            200 | 404 => Ok(()),
            status => Err(format!("Unexpected response status: {}", status)),
        }
    }

    /// Run `op` up to `max_retries + 1` times with exponential backoff,
    /// returning the last error message once attempts are exhausted.
    async fn with_retries<F, Fut>(&self, operation: &str, remote_path: &str, op: F) -> Result<(), String>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<(), String>>,
    {
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            match op().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        operation = operation,
                        remote_path = remote_path,
                        attempt = attempt + 1,
                        error = %e,
                        "Storage request failed"
                    );
                    last_error = e;
                }
            }

            if attempt < self.max_retries {
                let delay = self.initial_retry_delay * 2u32.pow(attempt);
                tracing::debug!(
                    operation = operation,
                    remote_path = remote_path,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying storage request"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl RemoteStore for StorageClient {
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> StorageResult<Uploaded> {
        // A missing local file is not a transient condition; fail without
        // burning retries.
        let body = match tokio::fs::read(local_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::LocalFileMissing(
                    local_path.display().to_string(),
                ));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let size = body.len() as u64;
        let start = std::time::Instant::now();

        tracing::info!(
            local_path = %local_path.display(),
            remote_path = remote_path,
            size_bytes = size,
            "Uploading file to storage zone"
        );

        self.with_retries("upload", remote_path, || self.put_object(remote_path, body.clone()))
            .await
            .map_err(|e| {
                tracing::error!(
                    remote_path = remote_path,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    error = %e,
                    "Upload failed after retries"
                );
                StorageError::UploadFailed(e)
            })?;

        let url = self.url_for(remote_path);

        tracing::info!(
            remote_path = remote_path,
            url = %url,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload successful"
        );

        Ok(Uploaded { url })
    }

    async fn delete_file(&self, remote_path: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();

        self.with_retries("delete", remote_path, || self.delete_object(remote_path))
            .await
            .map_err(|e| {
                tracing::error!(
                    remote_path = remote_path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    error = %e,
                    "Delete failed after retries"
                );
                StorageError::DeleteFailed(e)
            })?;

        tracing::info!(
            remote_path = remote_path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Delete successful"
        );

        Ok(())
    }

    async fn test_connection(&self) -> bool {
        let root_url = format!(
            "{}/{}/",
            self.settings.storage_url, self.settings.storage_zone
        );

        match self
            .http
            .get(&root_url)
            .header("AccessKey", &self.settings.access_key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::error!(error = %e, "Storage connection test failed");
                false
            }
        }
    }

    fn url_for(&self, remote_path: &str) -> String {
        format!("{}/{}", self.settings.pull_zone_url, remote_path)
    }

    fn remote_path_for(&self, url: &str) -> Option<String> {
        url.strip_prefix(&format!("{}/", self.settings.pull_zone_url))
            .map(str::to_string)
    }
}
