//! Ingest: attach a variant manifest to a freshly stored record.

use std::path::PathBuf;
use std::sync::Arc;

use mediasync_core::{AppError, AssetPatch, AssetRecord, MediaSource};
use mediasync_db::AssetStore;
use mediasync_processing::VariantGenerator;

pub struct IngestPipeline {
    store: Arc<dyn AssetStore>,
    generator: VariantGenerator,
    media_dir: PathBuf,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn AssetStore>, generator: VariantGenerator, media_dir: PathBuf) -> Self {
        Self {
            store,
            generator,
            media_dir,
        }
    }

    /// Generate and persist the variant manifest for one record. Returns the
    /// updated record.
    ///
    /// Externally hosted records and records that already carry a manifest
    /// pass through untouched; a manifest is written at most once per record.
    /// An empty ladder result is persisted too, so a source the ladder cannot
    /// handle is not re-processed on every pass.
    pub async fn ingest(&self, record: &AssetRecord) -> Result<AssetRecord, AppError> {
        if record.source == MediaSource::Cdn {
            tracing::debug!(id = %record.id, "Skipping externally hosted record");
            return Ok(record.clone());
        }
        if record.has_variants() {
            tracing::debug!(id = %record.id, "Record already has a variant manifest");
            return Ok(record.clone());
        }

        let local_path = self.media_dir.join(&record.filename);
        let start = std::time::Instant::now();
        let set = self.generator.generate(&local_path, &record.mime_type).await;

        if set.is_empty() {
            tracing::warn!(
                id = %record.id,
                filename = %record.filename,
                skipped = set.skipped.len(),
                "Ingest produced no variants"
            );
        } else {
            tracing::info!(
                id = %record.id,
                filename = %record.filename,
                variants = set.len(),
                skipped = set.skipped.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Variant manifest generated"
            );
        }

        self.store
            .update(record.id, AssetPatch::with_variants(record, set))
            .await
    }

    /// Ingest pass over records the upload sweep would pick up. Used when
    /// the worker runs without CDN credentials: variants are still generated
    /// locally even though nothing can be mirrored.
    pub async fn ingest_pending(&self, batch_size: i64) -> Result<usize, AppError> {
        let records = self.store.find_unsynced(batch_size).await?;
        let mut processed = 0;

        for record in &records {
            if record.has_variants() {
                continue;
            }
            match self.ingest(record).await {
                Ok(_) => processed += 1,
                Err(e) => {
                    tracing::error!(id = %record.id, error = %e, "Ingest failed for record");
                }
            }
        }

        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use mediasync_db::MemoryAssetStore;
    use tempfile::TempDir;

    fn pipeline(store: &MemoryAssetStore, dir: &TempDir) -> IngestPipeline {
        IngestPipeline::new(
            Arc::new(store.clone()),
            VariantGenerator::new("ffmpeg", "ffprobe"),
            dir.path().to_path_buf(),
        )
    }

    async fn stored_image(store: &MemoryAssetStore, dir: &TempDir, name: &str) -> AssetRecord {
        let img = RgbaImage::from_pixel(800, 600, Rgba([10, 120, 60, 255]));
        img.save(dir.path().join(name)).unwrap();
        store
            .create(AssetRecord::new_upload(name, "image/png", 1024))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn image_ingest_persists_the_manifest() {
        let dir = TempDir::new().unwrap();
        let store = MemoryAssetStore::new();
        let record = stored_image(&store, &dir, "photo.png").await;

        let updated = pipeline(&store, &dir).ingest(&record).await.unwrap();

        let sizes = updated.sizes.expect("image manifest");
        assert!(sizes.get("thumbnail").is_some());
        assert!(sizes.get("small").is_some());
        assert!(updated.video_sizes.is_none());
        assert!(dir.path().join("photo-small.webp").exists());
    }

    #[tokio::test]
    async fn externally_hosted_records_are_left_alone() {
        let dir = TempDir::new().unwrap();
        let store = MemoryAssetStore::new();
        let mut record = AssetRecord::new_upload("remote.png", "image/png", 1024);
        record.source = MediaSource::Cdn;
        store.create(record.clone()).await.unwrap();

        let updated = pipeline(&store, &dir).ingest(&record).await.unwrap();

        assert!(updated.sizes.is_none());
        assert_eq!(store.snapshot(record.id).unwrap().sizes, None);
    }

    #[tokio::test]
    async fn manifest_is_written_at_most_once() {
        let dir = TempDir::new().unwrap();
        let store = MemoryAssetStore::new();
        let record = stored_image(&store, &dir, "photo.png").await;
        let pipeline = pipeline(&store, &dir);

        let first = pipeline.ingest(&record).await.unwrap();

        // Remove the source; a second pass must not regenerate anything.
        std::fs::remove_file(dir.path().join("photo.png")).unwrap();
        let second = pipeline.ingest(&first).await.unwrap();

        assert_eq!(second.sizes, first.sizes);
    }

    #[tokio::test]
    async fn unhandled_mime_persists_an_empty_manifest() {
        let dir = TempDir::new().unwrap();
        let store = MemoryAssetStore::new();
        std::fs::write(dir.path().join("doc.pdf"), b"%PDF-").unwrap();
        let record = store
            .create(AssetRecord::new_upload("doc.pdf", "application/pdf", 5))
            .await
            .unwrap();

        let updated = pipeline(&store, &dir).ingest(&record).await.unwrap();

        let sizes = updated
            .sizes
            .as_ref()
            .expect("manifest persisted even when empty");
        assert!(sizes.is_empty());
        assert!(updated.has_variants());
    }

    #[tokio::test]
    async fn pending_pass_processes_only_records_without_manifests() {
        let dir = TempDir::new().unwrap();
        let store = MemoryAssetStore::new();
        let fresh = stored_image(&store, &dir, "fresh.png").await;
        let done = stored_image(&store, &dir, "done.png").await;
        let pipeline = pipeline(&store, &dir);
        pipeline.ingest(&done).await.unwrap();

        let processed = pipeline.ingest_pending(100).await.unwrap();

        assert_eq!(processed, 1);
        assert!(store.snapshot(fresh.id).unwrap().has_variants());
    }
}
