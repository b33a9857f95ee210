//! ffmpeg resolution/bitrate ladder for video sources.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

pub const THUMBNAIL_NAME: &str = "thumbnail";
pub const THUMBNAIL_WIDTH: u32 = 1280;
pub const THUMBNAIL_HEIGHT: u32 = 720;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoRung {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
}

/// Fixed rendition ladder, low to full. Rungs wider than the source are
/// skipped at planning time; renditions never upscale.
pub const VIDEO_LADDER: [VideoRung; 4] = [
    VideoRung {
        name: "low",
        width: 480,
        height: 480,
        bitrate_kbps: 400,
    },
    VideoRung {
        name: "medium",
        width: 854,
        height: 480,
        bitrate_kbps: 800,
    },
    VideoRung {
        name: "high",
        width: 1280,
        height: 720,
        bitrate_kbps: 1500,
    },
    VideoRung {
        name: "full",
        width: 1920,
        height: 1080,
        bitrate_kbps: 3000,
    },
];

/// Split the ladder into rungs to transcode and rungs too wide for the
/// source.
pub fn plan_ladder(source_width: u32) -> (Vec<VideoRung>, Vec<VideoRung>) {
    VIDEO_LADDER
        .iter()
        .copied()
        .partition(|rung| rung.width <= source_width)
}

/// Output file name for a rung: `{stem}-{name}.mp4`, always MP4 regardless
/// of the source container.
pub fn rung_filename(original_filename: &str, rung_name: &str) -> String {
    format!("{}-{}.mp4", file_stem(original_filename), rung_name)
}

/// Poster file name: `{stem}-thumb.jpg` (the manifest key is
/// [`THUMBNAIL_NAME`]).
pub fn thumbnail_filename(original_filename: &str) -> String {
    format!("{}-thumb.jpg", file_stem(original_filename))
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

/// ffmpeg arguments for one ladder rung. The scale filter fits the source
/// inside the target box and pads to exact dimensions, so every rendition
/// of a ladder level has identical geometry.
pub fn rung_args(input: &Path, output: &Path, rung: &VideoRung) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-crf".to_string(),
        "23".to_string(),
        "-maxrate".to_string(),
        format!("{}k", rung.bitrate_kbps),
        "-bufsize".to_string(),
        format!("{}k", rung.bitrate_kbps * 2),
        "-vf".to_string(),
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = rung.width,
            h = rung.height
        ),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// ffmpeg arguments for the poster thumbnail: first frame, fit inside
/// 1280x720.
pub fn thumbnail_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vframes".to_string(),
        "1".to_string(),
        "-vf".to_string(),
        format!(
            "scale={}:{}:force_original_aspect_ratio=decrease",
            THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT
        ),
        "-q:v".to_string(),
        "2".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

pub struct VideoTranscoder {
    ffmpeg_path: String,
}

impl VideoTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Transcode one rung, writing `{stem}-{name}.mp4` beside the input.
    /// Returns the output path.
    pub async fn transcode_rung(&self, input: &Path, rung: &VideoRung) -> Result<PathBuf> {
        let output = sibling(input, &rung_filename(&input_filename(input)?, rung.name));
        let start = std::time::Instant::now();

        self.run_ffmpeg(&rung_args(input, &output, rung)).await?;

        tracing::info!(
            input = %input.display(),
            variant = rung.name,
            duration_ms = start.elapsed().as_millis() as u64,
            "Video variant transcoded"
        );
        Ok(output)
    }

    /// Extract the poster thumbnail, writing `{stem}-thumb.jpg` beside the
    /// input. Returns the output path.
    pub async fn generate_thumbnail(&self, input: &Path) -> Result<PathBuf> {
        let output = sibling(input, &thumbnail_filename(&input_filename(input)?));
        self.run_ffmpeg(&thumbnail_args(input, &output)).await?;
        Ok(output)
    }

    async fn run_ffmpeg(&self, args: &[String]) -> Result<()> {
        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute ffmpeg")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffmpeg failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(())
    }
}

fn input_filename(input: &Path) -> Result<String> {
    input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("Input path has no file name: {}", input.display()))
}

fn sibling(input: &Path, filename: &str) -> PathBuf {
    input
        .parent()
        .map(|p| p.join(filename))
        .unwrap_or_else(|| PathBuf::from(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_hd_source_keeps_every_rung() {
        let (included, skipped) = plan_ladder(1920);
        assert_eq!(included.len(), 4);
        assert!(skipped.is_empty());
    }

    #[test]
    fn narrow_source_keeps_only_low() {
        let (included, skipped) = plan_ladder(640);
        let names: Vec<_> = included.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["low"]);
        let skipped_names: Vec<_> = skipped.iter().map(|r| r.name).collect();
        assert_eq!(skipped_names, vec!["medium", "high", "full"]);
    }

    #[test]
    fn rung_width_equal_to_source_is_kept() {
        let (included, _) = plan_ladder(480);
        assert_eq!(included.len(), 1);
        assert_eq!(included[0].name, "low");
    }

    #[test]
    fn rung_output_is_always_mp4() {
        assert_eq!(rung_filename("clip.mov", "medium"), "clip-medium.mp4");
        assert_eq!(rung_filename("clip.mp4", "low"), "clip-low.mp4");
    }

    #[test]
    fn thumbnail_output_is_jpeg() {
        assert_eq!(thumbnail_filename("clip.webm"), "clip-thumb.jpg");
    }

    #[test]
    fn rung_args_carry_encoder_and_padded_scale() {
        let rung = &VIDEO_LADDER[1];
        let args = rung_args(Path::new("/m/clip.mp4"), Path::new("/m/clip-medium.mp4"), rung);

        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"800k".to_string()));
        assert!(args.contains(&"1600k".to_string()));
        assert!(args.iter().any(|a| a.contains(
            "scale=854:480:force_original_aspect_ratio=decrease,pad=854:480:(ow-iw)/2:(oh-ih)/2"
        )));
        assert!(args.contains(&"+faststart".to_string()));
        assert_eq!(args.last().unwrap(), "/m/clip-medium.mp4");
    }

    #[test]
    fn thumbnail_args_grab_a_single_frame() {
        let args = thumbnail_args(Path::new("/m/clip.mp4"), Path::new("/m/clip-thumb.jpg"));
        assert!(args.contains(&"-vframes".to_string()));
        assert!(args.contains(&"1".to_string()));
        assert!(args
            .iter()
            .any(|a| a.contains("scale=1280:720:force_original_aspect_ratio=decrease")));
    }
}
