//! Reconciliation sweeps: mirror local originals to the CDN and reclaim
//! local disk space once the mirror has aged past the retention window.

use chrono::{Duration, Utc};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use mediasync_core::{AppError, AssetPatch, AssetRecord, Config};
use mediasync_db::AssetStore;
use mediasync_storage::{RemoteStore, StorageError};

use crate::ingest::IngestPipeline;

/// Outcome of one upload sweep. `attempted == succeeded + failed` always;
/// variant mirror problems land in `errors` without failing their record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct ReconcilerOptions {
    pub media_dir: PathBuf,
    pub batch_size: i64,
    pub retention_days: i64,
    pub keep_local_backup: bool,
}

impl ReconcilerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            media_dir: config.media_dir.clone(),
            batch_size: config.sync_batch_size,
            retention_days: config.delete_local_after_days,
            keep_local_backup: config.keep_local_backup,
        }
    }
}

pub struct SyncReconciler {
    store: Arc<dyn AssetStore>,
    remote: Arc<dyn RemoteStore>,
    ingest: Option<Arc<IngestPipeline>>,
    options: ReconcilerOptions,
}

fn remote_path(filename: &str) -> String {
    format!("media/{}", filename)
}

impl SyncReconciler {
    pub fn new(
        store: Arc<dyn AssetStore>,
        remote: Arc<dyn RemoteStore>,
        options: ReconcilerOptions,
    ) -> Self {
        Self {
            store,
            remote,
            ingest: None,
            options,
        }
    }

    /// Generate missing variant manifests inline, so a record picked up by
    /// the sweep has its renditions on disk before they are mirrored.
    pub fn with_ingest(mut self, ingest: Arc<IngestPipeline>) -> Self {
        self.ingest = Some(ingest);
        self
    }

    /// One upload sweep over the unsynced backlog. A per-record failure is
    /// recorded on the record and in the stats; it never aborts the sweep.
    pub async fn retry_failed_uploads(&self) -> Result<SyncStats, AppError> {
        let start = std::time::Instant::now();
        let records = self.store.find_unsynced(self.options.batch_size).await?;
        let mut stats = SyncStats::default();

        for record in &records {
            stats.attempted += 1;
            match self.sync_record(record).await {
                Ok(mirror_errors) => {
                    stats.succeeded += 1;
                    stats.errors.extend(mirror_errors);
                }
                Err(e) => {
                    stats.failed += 1;
                    stats.errors.push(format!("{}: {}", record.filename, e));
                }
            }
        }

        tracing::info!(
            attempted = stats.attempted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Upload sweep finished"
        );
        Ok(stats)
    }

    /// Mirror one record's canonical file, then its variants best-effort.
    /// Returns variant mirror errors on success.
    async fn sync_record(&self, record: &AssetRecord) -> Result<Vec<String>, String> {
        let record = self.ensure_variants(record).await;
        let local_path = self.options.media_dir.join(&record.filename);

        match tokio::fs::metadata(&local_path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let msg = format!("Local file not found: {}", local_path.display());
                if let Err(e) = self
                    .store
                    .update(record.id, AssetPatch::sync_abandoned(&msg))
                    .await
                {
                    tracing::error!(id = %record.id, error = %e, "Failed to record abandoned sync");
                }
                tracing::warn!(id = %record.id, filename = %record.filename, "Abandoning sync; local file is gone");
                return Err(msg);
            }
            Err(e) => return Err(format!("Cannot stat {}: {}", local_path.display(), e)),
        }

        let path = remote_path(&record.filename);
        match self.remote.upload_file(&local_path, &path).await {
            Ok(uploaded) => {
                self.store
                    .update(record.id, AssetPatch::synced(uploaded.url, path, Utc::now()))
                    .await
                    .map_err(|e| format!("Sync succeeded but update failed: {}", e))?;
                tracing::info!(id = %record.id, filename = %record.filename, "Record mirrored to CDN");
                Ok(self.mirror_variants(&record).await)
            }
            Err(StorageError::LocalFileMissing(path)) => {
                let msg = format!("Local file not found: {}", path);
                if let Err(e) = self
                    .store
                    .update(record.id, AssetPatch::sync_abandoned(&msg))
                    .await
                {
                    tracing::error!(id = %record.id, error = %e, "Failed to record abandoned sync");
                }
                Err(msg)
            }
            Err(e) => {
                let msg = e.to_string();
                if let Err(e) = self
                    .store
                    .update(record.id, AssetPatch::sync_failed(&msg))
                    .await
                {
                    tracing::error!(id = %record.id, error = %e, "Failed to record sync error");
                }
                Err(msg)
            }
        }
    }

    async fn ensure_variants(&self, record: &AssetRecord) -> AssetRecord {
        let Some(ingest) = &self.ingest else {
            return record.clone();
        };
        if record.variant_set().is_some() {
            return record.clone();
        }
        match ingest.ingest(record).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Inline ingest failed; mirroring original only");
                record.clone()
            }
        }
    }

    /// Mirror variant files after a successful canonical upload. Variants
    /// are derived data; a failure here is aggregated but does not unmark
    /// the record, and a missing variant file is not an error.
    async fn mirror_variants(&self, record: &AssetRecord) -> Vec<String> {
        let Some(set) = record.variant_set() else {
            return Vec::new();
        };

        let mut errors = Vec::new();
        for variant in set.iter() {
            let local_path = self.options.media_dir.join(&variant.filename);
            if tokio::fs::metadata(&local_path).await.is_err() {
                tracing::debug!(
                    id = %record.id,
                    variant = %variant.name,
                    "Variant file not on disk; skipping mirror"
                );
                continue;
            }
            if let Err(e) = self
                .remote
                .upload_file(&local_path, &remote_path(&variant.filename))
                .await
            {
                tracing::warn!(
                    id = %record.id,
                    variant = %variant.name,
                    error = %e,
                    "Variant mirror failed"
                );
                errors.push(format!("{}: {}", variant.filename, e));
            }
        }
        errors
    }

    /// One cleanup sweep: unlink local originals whose mirror is older than
    /// the retention window. Returns the number of files removed.
    pub async fn cleanup_local_files(&self) -> Result<usize, AppError> {
        if self.options.keep_local_backup {
            tracing::debug!("Local backups retained; cleanup sweep disabled");
            return Ok(0);
        }

        let cutoff = Utc::now() - Duration::days(self.options.retention_days);
        let candidates = self
            .store
            .find_cleanup_candidates(cutoff, self.options.batch_size)
            .await?;
        let mut deleted = 0;

        for record in &candidates {
            // Re-check the sync flag right before unlinking; the candidate
            // query result may be stale.
            match self.store.confirm_synced(record.id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(id = %record.id, "Record no longer synced; keeping local file");
                    continue;
                }
                Err(e) => {
                    tracing::error!(id = %record.id, error = %e, "Sync re-check failed; keeping local file");
                    continue;
                }
            }

            let path = self.options.media_dir.join(&record.filename);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    deleted += 1;
                    tracing::info!(
                        id = %record.id,
                        path = %path.display(),
                        "Local file removed after retention window"
                    );
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(id = %record.id, path = %path.display(), "Local file already gone");
                }
                Err(e) => {
                    tracing::warn!(
                        id = %record.id,
                        path = %path.display(),
                        error = %e,
                        "Failed to remove local file"
                    );
                }
            }
        }

        Ok(deleted)
    }
}
