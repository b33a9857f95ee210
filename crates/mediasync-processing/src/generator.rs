//! Ladder orchestration: one source file in, one variant manifest out.

use image::GenericImageView;
use std::path::Path;

use mediasync_core::{SkipReason, Variant, VariantSet};

use crate::image_ladder::{self, IMAGE_LADDER};
use crate::probe::VideoProbe;
use crate::video_ladder::{
    self, plan_ladder, VideoTranscoder, THUMBNAIL_HEIGHT, THUMBNAIL_NAME, THUMBNAIL_WIDTH,
};

pub struct VariantGenerator {
    probe: VideoProbe,
    transcoder: VideoTranscoder,
}

impl VariantGenerator {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            probe: VideoProbe::new(ffprobe_path),
            transcoder: VideoTranscoder::new(ffmpeg_path),
        }
    }

    /// Run the ladder matching `mime_type` over `local_path`. A rung failure
    /// is recorded in the manifest and never aborts the remaining rungs; an
    /// unprocessable source yields an empty manifest rather than an error.
    pub async fn generate(&self, local_path: &Path, mime_type: &str) -> VariantSet {
        if mime_type.starts_with("video/") {
            self.generate_video_variants(local_path).await
        } else if mime_type.starts_with("image/") {
            self.generate_image_variants(local_path).await
        } else {
            tracing::debug!(
                path = %local_path.display(),
                mime_type = mime_type,
                "No variant ladder for mime type"
            );
            VariantSet::default()
        }
    }

    async fn generate_video_variants(&self, local_path: &Path) -> VariantSet {
        let mut set = VariantSet::default();
        let Some(original) = file_name(local_path) else {
            return set;
        };

        let info = self.probe.probe_or_default(local_path).await;
        let (included, too_wide) = plan_ladder(info.width);
        for rung in &too_wide {
            set.skip(rung.name, SkipReason::SourceTooSmall);
        }

        for rung in &included {
            match self.transcoder.transcode_rung(local_path, rung).await {
                Ok(output) => {
                    let filename = video_ladder::rung_filename(&original, rung.name);
                    match tokio::fs::metadata(&output).await {
                        Ok(meta) => set.insert(Variant {
                            name: rung.name.to_string(),
                            url: format!("/media/{}", filename),
                            filename,
                            width: rung.width,
                            height: rung.height,
                            bitrate_kbps: Some(rung.bitrate_kbps),
                            filesize: meta.len(),
                            mime_type: "video/mp4".to_string(),
                        }),
                        Err(e) => {
                            tracing::warn!(
                                variant = rung.name,
                                error = %e,
                                "Transcoded variant missing on disk"
                            );
                            set.skip(rung.name, SkipReason::TranscodeFailed);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        path = %local_path.display(),
                        variant = rung.name,
                        error = %e,
                        "Video variant transcode failed"
                    );
                    set.skip(rung.name, SkipReason::TranscodeFailed);
                }
            }
        }

        match self.transcoder.generate_thumbnail(local_path).await {
            Ok(output) => {
                let filename = video_ladder::thumbnail_filename(&original);
                if let Ok(meta) = tokio::fs::metadata(&output).await {
                    set.insert(Variant {
                        name: THUMBNAIL_NAME.to_string(),
                        url: format!("/media/{}", filename),
                        filename,
                        width: THUMBNAIL_WIDTH,
                        height: THUMBNAIL_HEIGHT,
                        bitrate_kbps: None,
                        filesize: meta.len(),
                        mime_type: "image/jpeg".to_string(),
                    });
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %local_path.display(),
                    error = %e,
                    "Thumbnail generation failed"
                );
                set.skip(THUMBNAIL_NAME, SkipReason::TranscodeFailed);
            }
        }

        set
    }

    async fn generate_image_variants(&self, local_path: &Path) -> VariantSet {
        let mut set = VariantSet::default();
        let Some(original) = file_name(local_path) else {
            return set;
        };

        let img = match tokio::fs::read(local_path).await {
            Ok(bytes) => match image::load_from_memory(&bytes) {
                Ok(img) => img,
                Err(e) => {
                    tracing::warn!(
                        path = %local_path.display(),
                        error = %e,
                        "Image decode failed; skipping all rungs"
                    );
                    for rung in &IMAGE_LADDER {
                        set.skip(rung.name, SkipReason::EncodeFailed);
                    }
                    return set;
                }
            },
            Err(e) => {
                tracing::warn!(
                    path = %local_path.display(),
                    error = %e,
                    "Image source unreadable; skipping all rungs"
                );
                for rung in &IMAGE_LADDER {
                    set.skip(rung.name, SkipReason::EncodeFailed);
                }
                return set;
            }
        };

        let (src_width, _) = img.dimensions();
        for rung in &IMAGE_LADDER {
            if rung.width > src_width {
                set.skip(rung.name, SkipReason::SourceTooSmall);
                continue;
            }

            let encoded = match image_ladder::render_rung(&img, rung) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(
                        path = %local_path.display(),
                        variant = rung.name,
                        error = %e,
                        "Image variant encode failed"
                    );
                    set.skip(rung.name, SkipReason::EncodeFailed);
                    continue;
                }
            };

            let (bytes, width, height) = encoded;
            let filename = image_ladder::rung_filename(&original, rung);
            let output = local_path.with_file_name(&filename);
            if let Err(e) = tokio::fs::write(&output, &bytes).await {
                tracing::warn!(
                    path = %output.display(),
                    variant = rung.name,
                    error = %e,
                    "Image variant write failed"
                );
                set.skip(rung.name, SkipReason::EncodeFailed);
                continue;
            }

            set.insert(Variant {
                name: rung.name.to_string(),
                url: format!("/media/{}", filename),
                filename,
                width,
                height,
                bitrate_kbps: None,
                filesize: bytes.len() as u64,
                mime_type: rung.format.mime_type().to_string(),
            });
        }

        set
    }
}

fn file_name(path: &Path) -> Option<String> {
    let name = path.file_name().map(|s| s.to_string_lossy().into_owned());
    if name.is_none() {
        tracing::warn!(path = %path.display(), "Source path has no file name");
    }
    name
}
