//! Canonical pixel buffers and source decoding.
//!
//! Every source is normalized to RGBA on load, whatever its container or
//! color type, so the transform stages only ever see one input shape.

use crate::error::{DecodeError, ProcessingError};
use crate::format_spec::ColorMode;
use image::{RgbImage, RgbaImage};
use rgb::{RGB8, RGBA8};
use std::path::{Path, PathBuf};

/// Extensions accepted as source images, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".png", ".jpeg", ".jpg", ".bmp", ".gif", ".tiff", ".webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelData {
    Rgba(Vec<RGBA8>),
    Rgb(Vec<RGB8>),
    Indexed { palette: Vec<RGB8>, indices: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalImage {
    pub width: u32,
    pub height: u32,
    pub pixels: PixelData,
}

impl CanonicalImage {
    pub fn from_rgba_image(img: &RgbaImage) -> Self {
        let pixels = img
            .pixels()
            .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
            .collect();
        Self {
            width: img.width(),
            height: img.height(),
            pixels: PixelData::Rgba(pixels),
        }
    }

    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let pixels = img.pixels().map(|p| RGB8::new(p[0], p[1], p[2])).collect();
        Self {
            width: img.width(),
            height: img.height(),
            pixels: PixelData::Rgb(pixels),
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        match self.pixels {
            PixelData::Rgba(_) => ColorMode::Rgba,
            PixelData::Rgb(_) => ColorMode::Rgb,
            PixelData::Indexed { .. } => ColorMode::Indexed,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Checks that the buffer holds exactly one entry per pixel and that
    /// every palette index is in range.
    pub fn check_layout(&self) -> Result<(), ProcessingError> {
        let len = match &self.pixels {
            PixelData::Rgba(px) => px.len(),
            PixelData::Rgb(px) => px.len(),
            PixelData::Indexed { palette, indices } => {
                if indices.iter().any(|&i| i as usize >= palette.len()) {
                    return Err(ProcessingError::InvalidGeometry {
                        width: self.width,
                        height: self.height,
                    });
                }
                indices.len()
            }
        };
        if len != self.pixel_count() {
            return Err(ProcessingError::InvalidGeometry {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Expands any layout to RGBA. Palette and RGB pixels become opaque.
    pub fn to_rgba_pixels(&self) -> Vec<RGBA8> {
        match &self.pixels {
            PixelData::Rgba(px) => px.clone(),
            PixelData::Rgb(px) => px.iter().map(|p| p.with_alpha(255)).collect(),
            PixelData::Indexed { palette, indices } => indices
                .iter()
                .map(|&i| palette[i as usize].with_alpha(255))
                .collect(),
        }
    }

    /// Expands any layout to RGB, dropping alpha without blending.
    pub fn to_rgb_pixels(&self) -> Vec<RGB8> {
        match &self.pixels {
            PixelData::Rgba(px) => px.iter().map(|p| p.rgb()).collect(),
            PixelData::Rgb(px) => px.clone(),
            PixelData::Indexed { palette, indices } => {
                indices.iter().map(|&i| palette[i as usize]).collect()
            }
        }
    }

    pub fn to_rgba_image(&self) -> Result<RgbaImage, ProcessingError> {
        self.check_layout()?;
        let raw = self
            .to_rgba_pixels()
            .iter()
            .flat_map(|p| [p.r, p.g, p.b, p.a])
            .collect();
        RgbaImage::from_raw(self.width, self.height, raw).ok_or(ProcessingError::InvalidGeometry {
            width: self.width,
            height: self.height,
        })
    }

    pub fn pixel_rgba(&self, x: u32, y: u32) -> Option<RGBA8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y * self.width + x) as usize;
        match &self.pixels {
            PixelData::Rgba(px) => px.get(idx).copied(),
            PixelData::Rgb(px) => px.get(idx).map(|p| p.with_alpha(255)),
            PixelData::Indexed { palette, indices } => indices
                .get(idx)
                .and_then(|&i| palette.get(i as usize))
                .map(|p| p.with_alpha(255)),
        }
    }

    pub fn distinct_colors(&self) -> usize {
        let colors: std::collections::HashSet<RGBA8> = self.to_rgba_pixels().into_iter().collect();
        colors.len()
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_ascii_lowercase()))
}

pub fn is_supported_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    extension_of(path).is_some_and(|ext| {
        extensions.iter().any(|allowed| {
            let allowed = allowed.as_ref().to_ascii_lowercase();
            allowed == ext || format!(".{allowed}") == ext
        })
    })
}

/// Loads a source image using the default extension policy.
pub fn load_image(path: &Path) -> Result<CanonicalImage, DecodeError> {
    load_image_with(path, SUPPORTED_EXTENSIONS)
}

/// Loads a source image, checking the extension against `extensions` before
/// touching the file. The container itself is sniffed from the content.
pub fn load_image_with<S: AsRef<str>>(
    path: &Path,
    extensions: &[S],
) -> Result<CanonicalImage, DecodeError> {
    if !is_supported_extension(path, extensions) {
        return Err(DecodeError::UnsupportedExtension {
            path: path.to_path_buf(),
            extension: extension_of(path).unwrap_or_default(),
        });
    }

    let bytes = std::fs::read(path).map_err(|e| DecodeError::UnreadableFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    decode_bytes(&bytes, path)
}

/// Decodes an in-memory image of any supported container.
pub fn load_image_from_bytes(bytes: &[u8]) -> Result<CanonicalImage, DecodeError> {
    decode_bytes(bytes, Path::new("<memory>"))
}

fn decode_bytes(bytes: &[u8], origin: &Path) -> Result<CanonicalImage, DecodeError> {
    let img = image::load_from_memory(bytes).map_err(|e| DecodeError::UnreadableFile {
        path: PathBuf::from(origin),
        reason: e.to_string(),
    })?;
    let rgba = img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(DecodeError::UnreadableFile {
            path: PathBuf::from(origin),
            reason: "image has no pixels".to_string(),
        });
    }

    tracing::debug!(
        source = %origin.display(),
        width = rgba.width(),
        height = rgba.height(),
        "decoded source image"
    );
    Ok(CanonicalImage::from_rgba_image(&rgba))
}
