//! Variant generation: derived renditions of uploaded media.
//!
//! Video files go through an ffmpeg resolution/bitrate ladder plus a poster
//! thumbnail; images go through a WebP/JPEG resize ladder. Both branches
//! degrade per rung rather than failing the whole file.

pub mod generator;
pub mod image_ladder;
pub mod probe;
pub mod video_ladder;

pub use generator::VariantGenerator;
pub use image_ladder::{ImageRung, IMAGE_LADDER};
pub use probe::{VideoInfo, VideoProbe};
pub use video_ladder::{VideoRung, VideoTranscoder, VIDEO_LADDER};
