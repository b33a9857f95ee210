mod ingest;
mod reconciler;
mod scheduler;
mod telemetry;
#[cfg(test)]
mod testutil;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

use mediasync_core::Config;
use mediasync_db::{AssetStore, PgAssetStore};
use mediasync_processing::VariantGenerator;
use mediasync_storage::{RemoteStore, StorageClient};

use crate::ingest::IngestPipeline;
use crate::reconciler::{ReconcilerOptions, SyncReconciler};
use crate::scheduler::{SchedulerConfig, SyncScheduler};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    telemetry::init();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let store: Arc<dyn AssetStore> = Arc::new(PgAssetStore::new(pool));

    let ingest = Arc::new(IngestPipeline::new(
        store.clone(),
        VariantGenerator::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone()),
        config.media_dir.clone(),
    ));

    let mut scheduler = None;
    match StorageClient::from_settings(config.cdn.clone()) {
        Some(client) if config.auto_sync_enabled => {
            if !client.test_connection().await {
                tracing::warn!("Storage connectivity check failed; sweeps will retry anyway");
            }
            let remote: Arc<dyn RemoteStore> = Arc::new(client);
            let reconciler = Arc::new(
                SyncReconciler::new(store.clone(), remote, ReconcilerOptions::from_config(&config))
                    .with_ingest(ingest.clone()),
            );
            scheduler = Some(SyncScheduler::start(
                reconciler,
                SchedulerConfig::new(config.retry_interval_minutes, config.cleanup_interval_days),
            ));
        }
        remote => {
            if remote.is_none() {
                tracing::warn!("CDN credentials incomplete; running ingest-only");
            } else {
                tracing::info!("CDN auto-sync disabled; running ingest-only");
            }
            spawn_ingest_loop(
                ingest.clone(),
                config.sync_batch_size,
                Duration::from_secs(config.retry_interval_minutes * 60),
            );
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    if let Some(scheduler) = &scheduler {
        scheduler.shutdown().await;
    }
    Ok(())
}

/// Degraded mode: variants are still generated on the same cadence as the
/// upload sweep, so records are ready to mirror once credentials appear.
fn spawn_ingest_loop(ingest: Arc<IngestPipeline>, batch_size: i64, period: Duration) {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        loop {
            timer.tick().await;
            match ingest.ingest_pending(batch_size).await {
                Ok(processed) if processed > 0 => {
                    tracing::info!(processed = processed, "Ingest pass finished");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Ingest pass failed");
                }
            }
        }
    });
}
