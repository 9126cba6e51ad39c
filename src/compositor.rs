//! Standard rendition path: stretch, convert, flatten, quantize.
//!
//! The steps run in a fixed order. Quantization comes last so a configured
//! background color competes for palette slots like any other color.

use crate::error::ProcessingError;
use crate::format_spec::{ColorMode, FormatSpec};
use crate::image_processor::{CanonicalImage, PixelData};
use crate::quantizer;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use rgb::{RGB8, RGBA8};

/// Resampling filter shared by every resize in the pipeline.
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Pixels converted to the target mode, with the pre-conversion alpha kept
/// as the paste mask for background flattening.
struct Converted {
    pixels: PixelData,
    mask: Vec<u8>,
}

/// Renders `image` for a non-thermal `spec`.
pub fn render_standard(image: &CanonicalImage, spec: &FormatSpec) -> Result<CanonicalImage, ProcessingError> {
    spec.validate()?;
    let (width, height) = spec.dimensions;

    let resized = resize_exact(&image.to_rgba_image()?, width, height)?;
    tracing::debug!(width, height, "resized to target dimensions");

    let converted = convert_mode(&resized, spec.color_mode);

    let pixels = match spec.background {
        Some(bg) => flatten_onto(converted, RGB8::new(bg[0], bg[1], bg[2])),
        None => converted.pixels,
    };
    let rendered = CanonicalImage { width, height, pixels };

    if spec.color_mode == ColorMode::Indexed {
        return quantizer::quantize(&rendered, spec.palette_budget());
    }
    Ok(rendered)
}

/// Resizes to exactly `width` x `height`, ignoring the source aspect ratio.
pub fn resize_exact(img: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, ProcessingError> {
    if width == 0 || height == 0 {
        return Err(ProcessingError::InvalidGeometry { width, height });
    }
    if img.width() == 0 || img.height() == 0 {
        return Err(ProcessingError::InvalidGeometry {
            width: img.width(),
            height: img.height(),
        });
    }
    if img.dimensions() == (width, height) {
        return Ok(img.clone());
    }
    Ok(imageops::resize(img, width, height, RESAMPLE_FILTER))
}

/// Indexed targets stay in RGB until quantization.
fn convert_mode(img: &RgbaImage, mode: ColorMode) -> Converted {
    let mask = img.pixels().map(|p| p[3]).collect();
    let pixels = match mode {
        ColorMode::Rgba => {
            PixelData::Rgba(img.pixels().map(|p| RGBA8::new(p[0], p[1], p[2], p[3])).collect())
        }
        ColorMode::Rgb | ColorMode::Indexed => {
            PixelData::Rgb(img.pixels().map(|p| RGB8::new(p[0], p[1], p[2])).collect())
        }
    };
    Converted { pixels, mask }
}

#[inline]
fn blend_channel(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((fg as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
}

/// Pastes the converted pixels onto a solid `bg` using the kept alpha mask.
/// The result is fully opaque.
fn flatten_onto(converted: Converted, bg: RGB8) -> PixelData {
    let Converted { pixels, mask } = converted;
    let blend = |p: RGB8, a: u8| {
        RGB8::new(
            blend_channel(p.r, bg.r, a),
            blend_channel(p.g, bg.g, a),
            blend_channel(p.b, bg.b, a),
        )
    };
    match pixels {
        PixelData::Rgba(px) => PixelData::Rgba(
            px.iter()
                .zip(&mask)
                .map(|(p, &a)| blend(p.rgb(), a).with_alpha(255))
                .collect(),
        ),
        PixelData::Rgb(px) => PixelData::Rgb(px.iter().zip(&mask).map(|(p, &a)| blend(*p, a)).collect()),
        indexed @ PixelData::Indexed { .. } => indexed,
    }
}
