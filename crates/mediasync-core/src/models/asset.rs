//! Asset records: one per uploaded file, carrying transcoding and CDN sync
//! state. (Project/page content lives in the CMS and is out of scope here.)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::variant::VariantSet;

/// Where the canonical bytes of a record live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    /// Canonical bytes are on local disk, managed by this pipeline.
    Upload,
    /// Record only references an externally hosted URL; the pipeline never
    /// transcodes or syncs it.
    Cdn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: Uuid,
    /// Name of the original file on local storage. Immutable after ingest.
    pub filename: String,
    pub mime_type: String,
    pub filesize: i64,
    pub source: MediaSource,
    /// Image variant manifest, populated once by ingest.
    pub sizes: Option<VariantSet>,
    /// Video variant manifest, populated once by ingest.
    pub video_sizes: Option<VariantSet>,
    /// Remote URL of the mirrored original. None until the first successful
    /// upload.
    pub cdn_url: Option<String>,
    pub cdn_synced: bool,
    /// Last error from a failed mirror attempt. Cleared on success.
    pub cdn_sync_error: Option<String>,
    pub cdn_uploaded_at: Option<DateTime<Utc>>,
    /// Remote object key of the mirror; needed to rebuild the URL and to
    /// delete the remote copy.
    pub cdn_remote_path: Option<String>,
    /// Terminal sync state: the local file is gone so retrying is pointless.
    /// Excluded from upload sweeps until cleared manually.
    pub sync_permanent_failure: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetRecord {
    pub fn new_upload(filename: impl Into<String>, mime_type: impl Into<String>, filesize: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            filesize,
            source: MediaSource::Upload,
            sizes: None,
            video_sizes: None,
            cdn_url: None,
            cdn_synced: false,
            cdn_sync_error: None,
            cdn_uploaded_at: None,
            cdn_remote_path: None,
            sync_permanent_failure: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// The variant manifest for this record's mime category, if populated.
    pub fn variant_set(&self) -> Option<&VariantSet> {
        if self.is_video() {
            self.video_sizes.as_ref()
        } else {
            self.sizes.as_ref()
        }
    }

    pub fn has_variants(&self) -> bool {
        self.variant_set().is_some()
    }
}

/// Partial update against an [`AssetRecord`]. Only fields set to `Some` are
/// written; nullable columns use a nested `Option` so "clear this field" and
/// "leave it alone" stay distinct.
#[derive(Debug, Clone, Default)]
pub struct AssetPatch {
    pub sizes: Option<VariantSet>,
    pub video_sizes: Option<VariantSet>,
    pub cdn_url: Option<Option<String>>,
    pub cdn_synced: Option<bool>,
    pub cdn_sync_error: Option<Option<String>>,
    pub cdn_uploaded_at: Option<Option<DateTime<Utc>>>,
    pub cdn_remote_path: Option<Option<String>>,
    pub sync_permanent_failure: Option<bool>,
}

impl AssetPatch {
    /// Patch recording a successful mirror of the canonical file.
    pub fn synced(url: String, remote_path: String, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            cdn_url: Some(Some(url)),
            cdn_synced: Some(true),
            cdn_sync_error: Some(None),
            cdn_uploaded_at: Some(Some(uploaded_at)),
            cdn_remote_path: Some(Some(remote_path)),
            ..Default::default()
        }
    }

    /// Patch recording a failed mirror attempt. The record stays eligible for
    /// the next sweep.
    pub fn sync_failed(error: impl Into<String>) -> Self {
        Self {
            cdn_sync_error: Some(Some(error.into())),
            ..Default::default()
        }
    }

    /// Patch for the missing-local-file case: the error is recorded and the
    /// record leaves the upload sweep's query for good.
    pub fn sync_abandoned(error: impl Into<String>) -> Self {
        Self {
            cdn_sync_error: Some(Some(error.into())),
            sync_permanent_failure: Some(true),
            ..Default::default()
        }
    }

    /// Patch attaching a freshly generated variant manifest.
    pub fn with_variants(record: &AssetRecord, set: VariantSet) -> Self {
        if record.is_video() {
            Self {
                video_sizes: Some(set),
                ..Default::default()
            }
        } else {
            Self {
                sizes: Some(set),
                ..Default::default()
            }
        }
    }

    /// Apply this patch to an in-memory record. The store backends use this
    /// to keep their update semantics identical.
    pub fn apply(&self, record: &mut AssetRecord) {
        if let Some(ref sizes) = self.sizes {
            record.sizes = Some(sizes.clone());
        }
        if let Some(ref video_sizes) = self.video_sizes {
            record.video_sizes = Some(video_sizes.clone());
        }
        if let Some(ref cdn_url) = self.cdn_url {
            record.cdn_url = cdn_url.clone();
        }
        if let Some(cdn_synced) = self.cdn_synced {
            record.cdn_synced = cdn_synced;
        }
        if let Some(ref cdn_sync_error) = self.cdn_sync_error {
            record.cdn_sync_error = cdn_sync_error.clone();
        }
        if let Some(cdn_uploaded_at) = self.cdn_uploaded_at {
            record.cdn_uploaded_at = cdn_uploaded_at;
        }
        if let Some(ref cdn_remote_path) = self.cdn_remote_path {
            record.cdn_remote_path = cdn_remote_path.clone();
        }
        if let Some(flag) = self.sync_permanent_failure {
            record.sync_permanent_failure = flag;
        }
        record.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synced_patch_clears_error_and_sets_url() {
        let mut record = AssetRecord::new_upload("clip.mp4", "video/mp4", 1024);
        record.cdn_sync_error = Some("connection reset".to_string());

        let now = Utc::now();
        AssetPatch::synced(
            "https://cdn.example.com/media/clip.mp4".to_string(),
            "media/clip.mp4".to_string(),
            now,
        )
        .apply(&mut record);

        assert!(record.cdn_synced);
        assert_eq!(record.cdn_sync_error, None);
        assert_eq!(record.cdn_uploaded_at, Some(now));
        assert_eq!(record.cdn_remote_path.as_deref(), Some("media/clip.mp4"));
    }

    #[test]
    fn failed_patch_leaves_url_untouched() {
        let mut record = AssetRecord::new_upload("clip.mp4", "video/mp4", 1024);
        AssetPatch::sync_failed("timeout").apply(&mut record);

        assert!(!record.cdn_synced);
        assert_eq!(record.cdn_url, None);
        assert_eq!(record.cdn_sync_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn abandoned_patch_sets_terminal_flag() {
        let mut record = AssetRecord::new_upload("clip.mp4", "video/mp4", 1024);
        AssetPatch::sync_abandoned("local file not found").apply(&mut record);

        assert!(record.sync_permanent_failure);
        assert!(!record.cdn_synced);
    }

    #[test]
    fn variant_patch_targets_mime_category() {
        let video = AssetRecord::new_upload("clip.mp4", "video/mp4", 1024);
        let image = AssetRecord::new_upload("photo.jpg", "image/jpeg", 1024);

        let patch = AssetPatch::with_variants(&video, VariantSet::default());
        assert!(patch.video_sizes.is_some());
        assert!(patch.sizes.is_none());

        let patch = AssetPatch::with_variants(&image, VariantSet::default());
        assert!(patch.sizes.is_some());
        assert!(patch.video_sizes.is_none());
    }
}
