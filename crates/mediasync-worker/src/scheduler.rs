//! Periodic driver for the reconciliation sweeps.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::reconciler::SyncReconciler;

#[derive(Clone)]
pub struct SchedulerConfig {
    pub upload_interval: Duration,
    pub cleanup_interval: Duration,
}

impl SchedulerConfig {
    pub fn new(retry_interval_minutes: u64, cleanup_interval_days: u64) -> Self {
        Self {
            upload_interval: Duration::from_secs(retry_interval_minutes * 60),
            cleanup_interval: Duration::from_secs(cleanup_interval_days * 24 * 60 * 60),
        }
    }
}

/// Spawns the sweep loop on construction; both sweeps run immediately at
/// startup and then on their intervals. A failing sweep is logged and the
/// loop keeps running.
pub struct SyncScheduler {
    shutdown_tx: mpsc::Sender<()>,
}

impl SyncScheduler {
    pub fn start(reconciler: Arc<SyncReconciler>, config: SchedulerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            Self::run_loop(reconciler, config, shutdown_rx).await;
        });

        Self { shutdown_tx }
    }

    async fn run_loop(
        reconciler: Arc<SyncReconciler>,
        config: SchedulerConfig,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut upload_timer = interval(config.upload_interval);
        let mut cleanup_timer = interval(config.cleanup_interval);

        tracing::info!(
            upload_interval_secs = config.upload_interval.as_secs(),
            cleanup_interval_secs = config.cleanup_interval.as_secs(),
            "Sync scheduler started"
        );

        loop {
            tokio::select! {
                _ = upload_timer.tick() => {
                    if let Err(e) = reconciler.retry_failed_uploads().await {
                        tracing::error!(error = %e, "Upload sweep failed");
                    }
                }
                _ = cleanup_timer.tick() => {
                    match reconciler.cleanup_local_files().await {
                        Ok(deleted) if deleted > 0 => {
                            tracing::info!(deleted = deleted, "Cleanup sweep removed local files");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "Cleanup sweep failed");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Sync scheduler shutting down");
                    break;
                }
            }
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::ReconcilerOptions;
    use crate::testutil::MockRemote;
    use mediasync_core::AssetRecord;
    use mediasync_db::{AssetStore, MemoryAssetStore};
    use tempfile::TempDir;

    fn test_reconciler(
        store: &MemoryAssetStore,
        remote: Arc<MockRemote>,
        dir: &TempDir,
    ) -> Arc<SyncReconciler> {
        Arc::new(SyncReconciler::new(
            Arc::new(store.clone()),
            remote,
            ReconcilerOptions {
                media_dir: dir.path().to_path_buf(),
                batch_size: 100,
                retention_days: 30,
                keep_local_backup: true,
            },
        ))
    }

    #[tokio::test]
    async fn scheduler_runs_the_upload_sweep_on_startup() {
        let dir = TempDir::new().unwrap();
        let store = MemoryAssetStore::new();
        std::fs::write(dir.path().join("clip.mp4"), b"bytes").unwrap();
        store
            .create(AssetRecord::new_upload("clip.mp4", "video/mp4", 5))
            .await
            .unwrap();
        let remote = Arc::new(MockRemote::new());
        let reconciler = test_reconciler(&store, remote.clone(), &dir);

        let scheduler = SyncScheduler::start(
            reconciler,
            SchedulerConfig {
                upload_interval: Duration::from_secs(3600),
                cleanup_interval: Duration::from_secs(3600),
            },
        );

        // First tick fires immediately; give the spawned loop a moment.
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.shutdown().await;

        assert_eq!(
            remote.uploads.lock().unwrap().clone(),
            vec!["media/clip.mp4".to_string()]
        );
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let dir = TempDir::new().unwrap();
        let store = MemoryAssetStore::new();
        let remote = Arc::new(MockRemote::new());
        let reconciler = test_reconciler(&store, remote.clone(), &dir);

        let scheduler = SyncScheduler::start(
            reconciler,
            SchedulerConfig {
                upload_interval: Duration::from_millis(10),
                cleanup_interval: Duration::from_secs(3600),
            },
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.shutdown().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        std::fs::write(dir.path().join("late.mp4"), b"bytes").unwrap();
        store
            .create(AssetRecord::new_upload("late.mp4", "video/mp4", 5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(remote.uploads.lock().unwrap().is_empty());
    }
}
