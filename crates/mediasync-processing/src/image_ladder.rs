//! WebP/JPEG resize ladder for image sources.

use anyhow::Result;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RungFormat {
    WebP { quality: f32 },
    Jpeg { quality: u8 },
}

impl RungFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RungFormat::WebP { .. } => "webp",
            RungFormat::Jpeg { .. } => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            RungFormat::WebP { .. } => "image/webp",
            RungFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRung {
    pub name: &'static str,
    pub width: u32,
    /// Fixed height turns the rung into a center-cropped cover; `None` keeps
    /// the source aspect ratio at the rung width.
    pub height: Option<u32>,
    pub format: RungFormat,
}

/// Fixed image ladder. The `og` rung matches the common social-card size.
/// Rungs wider than the source are skipped; images never upscale.
pub const IMAGE_LADDER: [ImageRung; 5] = [
    ImageRung {
        name: "thumbnail",
        width: 300,
        height: Some(300),
        format: RungFormat::WebP { quality: 80.0 },
    },
    ImageRung {
        name: "small",
        width: 600,
        height: None,
        format: RungFormat::WebP { quality: 85.0 },
    },
    ImageRung {
        name: "medium",
        width: 1024,
        height: None,
        format: RungFormat::WebP { quality: 85.0 },
    },
    ImageRung {
        name: "large",
        width: 1920,
        height: None,
        format: RungFormat::WebP { quality: 90.0 },
    },
    ImageRung {
        name: "og",
        width: 1200,
        height: Some(630),
        format: RungFormat::Jpeg { quality: 85 },
    },
];

/// Output file name for a rung: `{stem}-{name}.{webp|jpg}`.
pub fn rung_filename(original_filename: &str, rung: &ImageRung) -> String {
    let stem = Path::new(original_filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| original_filename.to_string());
    format!("{}-{}.{}", stem, rung.name, rung.format.extension())
}

/// Final pixel dimensions of a rung for the given source.
pub fn target_dimensions(rung: &ImageRung, src_width: u32, src_height: u32) -> (u32, u32) {
    match rung.height {
        Some(h) => (rung.width, h),
        None => {
            let h = (rung.width as f32 * src_height as f32 / src_width as f32).round() as u32;
            (rung.width, h.max(1))
        }
    }
}

/// Resize and encode one rung. Cover rungs scale to fill and center-crop;
/// aspect rungs scale to the rung width.
pub fn render_rung(img: &DynamicImage, rung: &ImageRung) -> Result<(Vec<u8>, u32, u32)> {
    let (src_width, src_height) = img.dimensions();
    let (width, height) = target_dimensions(rung, src_width, src_height);

    let resized = match rung.height {
        Some(_) => img.resize_to_fill(width, height, FilterType::Lanczos3),
        None => img.resize_exact(width, height, FilterType::Lanczos3),
    };

    let encoded = match rung.format {
        RungFormat::WebP { quality } => encode_webp(&resized, quality),
        RungFormat::Jpeg { quality } => encode_jpeg(&resized, quality)?,
    };
    Ok((encoded, width, height))
}

fn encode_webp(img: &DynamicImage, quality: f32) -> Vec<u8> {
    let (width, height) = img.dimensions();
    let rgba = img.to_rgba8();
    let encoder = webp::Encoder::from_rgba(&rgba, width, height);
    encoder.encode(quality).to_vec()
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(quality as f32);
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);

    let mut comp = comp.start_compress(Vec::new())?;
    comp.write_scanlines(&rgb)?;
    Ok(comp.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([180, 40, 40, 255]),
        ))
    }

    fn rung(name: &str) -> ImageRung {
        *IMAGE_LADDER.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn aspect_rungs_derive_height_from_source() {
        assert_eq!(target_dimensions(&rung("small"), 800, 600), (600, 450));
        assert_eq!(target_dimensions(&rung("medium"), 2048, 1024), (1024, 512));
    }

    #[test]
    fn cover_rungs_keep_fixed_dimensions() {
        assert_eq!(target_dimensions(&rung("thumbnail"), 800, 600), (300, 300));
        assert_eq!(target_dimensions(&rung("og"), 4000, 1000), (1200, 630));
    }

    #[test]
    fn thumbnail_render_is_square_webp() {
        let (bytes, width, height) = render_rung(&sample(800, 600), &rung("thumbnail")).unwrap();
        assert_eq!((width, height), (300, 300));

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (300, 300));
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn og_render_is_jpeg() {
        let (bytes, width, height) = render_rung(&sample(2400, 1260), &rung("og")).unwrap();
        assert_eq!((width, height), (1200, 630));
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn filenames_follow_stem_name_extension() {
        assert_eq!(
            rung_filename("photo.png", &rung("small")),
            "photo-small.webp"
        );
        assert_eq!(rung_filename("photo.png", &rung("og")), "photo-og.jpg");
    }
}
