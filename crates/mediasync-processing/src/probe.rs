//! ffprobe wrapper: source dimensions and duration for ladder planning.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Dimensions assumed when ffprobe cannot read the source. The ladder then
/// runs in full and lets ffmpeg surface any real decode problem per rung.
pub const FALLBACK_WIDTH: u32 = 1920;
pub const FALLBACK_HEIGHT: u32 = 1080;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub duration_secs: Option<f64>,
    pub codec: Option<String>,
}

impl VideoInfo {
    pub fn fallback() -> Self {
        Self {
            width: FALLBACK_WIDTH,
            height: FALLBACK_HEIGHT,
            duration_secs: None,
            codec: None,
        }
    }
}

pub struct VideoProbe {
    ffprobe_path: String,
}

impl VideoProbe {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Probe the first video stream of `path`.
    pub async fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let probe_data: serde_json::Value =
            serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe output")?;
        parse_probe_output(&probe_data)
    }

    /// Probe that never fails: on error the fallback dimensions are assumed
    /// and the failure is logged.
    pub async fn probe_or_default(&self, path: &Path) -> VideoInfo {
        match self.probe(path).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Video probe failed; assuming {}x{}",
                    FALLBACK_WIDTH,
                    FALLBACK_HEIGHT
                );
                VideoInfo::fallback()
            }
        }
    }
}

fn parse_probe_output(probe_data: &serde_json::Value) -> Result<VideoInfo> {
    let stream = probe_data["streams"]
        .get(0)
        .ok_or_else(|| anyhow!("No video stream found"))?;

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse width"))? as u32;
    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse height"))? as u32;

    let duration_secs = probe_data["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok());
    let codec = stream["codec_name"].as_str().map(str::to_string);

    Ok(VideoInfo {
        width,
        height,
        duration_secs,
        codec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stream_dimensions_and_format_duration() {
        let data = serde_json::json!({
            "streams": [{"width": 1280, "height": 720, "codec_name": "h264"}],
            "format": {"duration": "12.5"}
        });

        let info = parse_probe_output(&data).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert_eq!(info.duration_secs, Some(12.5));
        assert_eq!(info.codec.as_deref(), Some("h264"));
    }

    #[test]
    fn missing_video_stream_is_an_error() {
        let data = serde_json::json!({"streams": [], "format": {}});
        assert!(parse_probe_output(&data).is_err());
    }

    #[test]
    fn duration_and_codec_are_optional() {
        let data = serde_json::json!({
            "streams": [{"width": 640, "height": 480}],
            "format": {}
        });

        let info = parse_probe_output(&data).unwrap();
        assert_eq!(info.duration_secs, None);
        assert_eq!(info.codec, None);
    }
}
