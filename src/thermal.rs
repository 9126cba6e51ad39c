//! Thermal printer layout.
//!
//! The printer bitmap is a fixed 600x256 white canvas. The logo is first
//! flattened onto white, scaled so its longer side is exactly 256 pixels,
//! then centered on the canvas. Unlike the standard path this never
//! stretches.

use crate::compositor::resize_exact;
use crate::error::ProcessingError;
use crate::format_spec::THERMAL_DIMENSIONS;
use crate::image_processor::CanonicalImage;
use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// Side of the square the logo is fitted into.
pub const FIT_BOX: u32 = 256;

/// Where the fitted logo lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermalLayout {
    pub fitted: (u32, u32),
    pub offset: (u32, u32),
}

/// Longer side becomes [`FIT_BOX`], the shorter keeps the aspect ratio.
pub fn bounded_fit(width: u32, height: u32) -> Result<(u32, u32), ProcessingError> {
    if width == 0 || height == 0 {
        return Err(ProcessingError::InvalidGeometry { width, height });
    }
    let ratio = width as f64 / height as f64;
    let scaled = |v: f64| (v.round() as u32).clamp(1, FIT_BOX);
    if ratio > 1.0 {
        Ok((FIT_BOX, scaled(FIT_BOX as f64 / ratio)))
    } else {
        Ok((scaled(FIT_BOX as f64 * ratio), FIT_BOX))
    }
}

/// Horizontally centered on x=300, vertically centered.
pub fn canvas_offset(fitted_width: u32, fitted_height: u32) -> (u32, u32) {
    let (canvas_w, canvas_h) = THERMAL_DIMENSIONS;
    let x = (canvas_w / 2).saturating_sub(fitted_width / 2);
    let y = canvas_h.saturating_sub(fitted_height) / 2;
    (x, y)
}

pub fn plan_layout(width: u32, height: u32) -> Result<ThermalLayout, ProcessingError> {
    let fitted = bounded_fit(width, height)?;
    Ok(ThermalLayout {
        fitted,
        offset: canvas_offset(fitted.0, fitted.1),
    })
}

/// Alpha-composites `img` over opaque white. The result is fully opaque.
fn composite_on_white(img: &RgbaImage) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(img.width(), img.height(), Rgba([255, 255, 255, 255]));
    for (dst, src) in out.pixels_mut().zip(img.pixels()) {
        let a = src[3] as u32;
        for c in 0..3 {
            dst[c] = ((src[c] as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        }
    }
    out
}

/// Renders the 600x256 printer bitmap.
pub fn render_thermal(image: &CanonicalImage) -> Result<CanonicalImage, ProcessingError> {
    let layout = plan_layout(image.width, image.height)?;
    let (fit_w, fit_h) = layout.fitted;
    let (x_offset, y_offset) = layout.offset;

    let flattened = composite_on_white(&image.to_rgba_image()?);
    let fitted = resize_exact(&flattened, fit_w, fit_h)?;

    let (canvas_w, canvas_h) = THERMAL_DIMENSIONS;
    let mut canvas = RgbImage::from_pixel(canvas_w, canvas_h, Rgb([255, 255, 255]));
    for (x, y, p) in fitted.enumerate_pixels() {
        canvas.put_pixel(x_offset + x, y_offset + y, Rgb([p[0], p[1], p[2]]));
    }

    tracing::debug!(
        source_width = image.width,
        source_height = image.height,
        fit_w,
        fit_h,
        x_offset,
        y_offset,
        "laid out thermal canvas"
    );
    Ok(CanonicalImage::from_rgb_image(&canvas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_spec::ColorMode;
    use crate::image_processor::PixelData;
    use proptest::prelude::*;
    use rgb::{RGB8, RGBA8};

    fn solid(width: u32, height: u32, color: RGBA8) -> CanonicalImage {
        CanonicalImage {
            width,
            height,
            pixels: PixelData::Rgba(vec![color; (width * height) as usize]),
        }
    }

    /// Bounding box of non-white canvas pixels as (min_x, min_y, max_x, max_y).
    fn content_bounds(img: &CanonicalImage) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        let pixels = img.to_rgb_pixels();
        for y in 0..img.height {
            for x in 0..img.width {
                if pixels[(y * img.width + x) as usize] == RGB8::new(255, 255, 255) {
                    continue;
                }
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bounds
    }

    #[test]
    fn test_square_source_fills_fit_box() {
        let layout = plan_layout(500, 500).unwrap();
        assert_eq!(layout.fitted, (256, 256));
        assert_eq!(layout.offset, (172, 0));
    }

    #[test]
    fn test_extreme_landscape_layout() {
        let layout = plan_layout(999, 111).unwrap();
        assert_eq!(layout.fitted, (256, 28));
        assert_eq!(layout.offset, (172, 114));
    }

    #[test]
    fn test_portrait_layout() {
        let layout = plan_layout(200, 800).unwrap();
        assert_eq!(layout.fitted, (64, 256));
        assert_eq!(layout.offset, (268, 0));
    }

    #[test]
    fn test_extreme_ratio_keeps_one_pixel() {
        assert_eq!(bounded_fit(10_000, 1).unwrap(), (256, 1));
        assert_eq!(bounded_fit(1, 10_000).unwrap(), (1, 256));
    }

    #[test]
    fn test_zero_source_is_invalid_geometry() {
        assert!(matches!(bounded_fit(0, 5), Err(ProcessingError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_output_is_rgb_canvas() {
        let out = render_thermal(&solid(123, 456, RGBA8::new(0, 0, 0, 255))).unwrap();
        assert_eq!((out.width, out.height), (600, 256));
        assert_eq!(out.color_mode(), ColorMode::Rgb);
    }

    #[test]
    fn test_transparent_source_becomes_white() {
        let out = render_thermal(&solid(100, 100, RGBA8::new(0, 0, 0, 0))).unwrap();
        assert!(out.to_rgb_pixels().iter().all(|p| *p == RGB8::new(255, 255, 255)));
    }

    #[test]
    fn test_square_content_is_centered() {
        let out = render_thermal(&solid(100, 100, RGBA8::new(0, 0, 0, 255))).unwrap();
        let (x0, y0, x1, y1) = content_bounds(&out).expect("logo should be visible");
        let cx = (x0 + x1) as f64 / 2.0;
        let cy = (y0 + y1) as f64 / 2.0;
        assert!((cx - 300.0).abs() <= 5.0, "horizontal center {cx}");
        assert!((cy - 128.0).abs() <= 5.0, "vertical center {cy}");
    }

    #[test]
    fn test_wide_content_lands_in_offset_band() {
        let out = render_thermal(&solid(999, 111, RGBA8::new(0, 0, 0, 255))).unwrap();
        let (x0, y0, x1, y1) = content_bounds(&out).unwrap();
        assert_eq!((x0, x1), (172, 172 + 255));
        assert_eq!((y0, y1), (114, 114 + 27));
    }

    proptest! {
        #[test]
        fn prop_bounded_fit_long_side_is_256(width in 1u32..4000, height in 1u32..4000) {
            let (w, h) = bounded_fit(width, height).unwrap();
            prop_assert_eq!(w.max(h), FIT_BOX);
            prop_assert!(w <= FIT_BOX && h <= FIT_BOX);

            let ratio = width as f64 / height as f64;
            let shorter = w.min(h) as f64;
            let expected = if ratio > 1.0 { 256.0 / ratio } else { 256.0 * ratio };
            prop_assert!((shorter - expected.round().max(1.0)).abs() <= 1.0);
        }

        #[test]
        fn prop_fitted_logo_stays_on_canvas(width in 1u32..4000, height in 1u32..4000) {
            let layout = plan_layout(width, height).unwrap();
            prop_assert!(layout.offset.0 + layout.fitted.0 <= 600);
            prop_assert!(layout.offset.1 + layout.fitted.1 <= 256);
        }
    }
}
