//! Container encoding and atomic file output.
//!
//! Encoding happens fully in memory. The bytes are then written to a
//! temporary file next to the destination and renamed over it, so a failed
//! or interrupted write never leaves a truncated file at the final path.

use crate::error::{EncodeError, PipelineError, ProcessingError};
use crate::format_spec::{Container, FormatSpec};
use crate::image_processor::{CanonicalImage, PixelData};
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Mode given to new output files on unix.
#[cfg(unix)]
const OUTPUT_FILE_MODE: u32 = 0o644;

/// Print resolution stamped into every BMP.
pub const PRINTER_DPI: u32 = 203;

pub const JPEG_QUALITY: u8 = 95;

const INCHES_PER_METER: f64 = 1.0 / 0.0254;
const BMP_X_PPM_OFFSET: usize = 38;
const BMP_Y_PPM_OFFSET: usize = 42;

/// A rendition that made it to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    pub path: PathBuf,
    pub bytes_written: u64,
}

/// Encodes `image` as `spec.container` and writes it to `destination`.
///
/// The destination's parent directory must already exist.
pub fn encode(image: &CanonicalImage, spec: &FormatSpec, destination: &Path) -> Result<RenderOutput, PipelineError> {
    image.check_layout()?;
    let bytes = encode_to_vec(image, spec.container)
        .map_err(|e| encode_failure(destination, e))?;
    write_atomic(destination, &bytes)?;

    tracing::info!(
        path = %destination.display(),
        format = spec.container.name(),
        width = image.width,
        height = image.height,
        bytes = bytes.len(),
        "saved rendition"
    );
    Ok(RenderOutput {
        path: destination.to_path_buf(),
        bytes_written: bytes.len() as u64,
    })
}

/// Failures while encoding in memory, before any file is touched.
#[derive(Debug)]
pub enum EncodeIssue {
    Unsupported(ProcessingError),
    Codec(std::io::Error),
}

fn encode_failure(destination: &Path, issue: EncodeIssue) -> PipelineError {
    match issue {
        EncodeIssue::Unsupported(e) => e.into(),
        EncodeIssue::Codec(e) => EncodeError::write_failure(destination, e).into(),
    }
}

fn codec_error(e: impl std::error::Error + Send + Sync + 'static) -> EncodeIssue {
    EncodeIssue::Codec(std::io::Error::other(e))
}

fn unsupported(container: Container, image: &CanonicalImage) -> EncodeIssue {
    EncodeIssue::Unsupported(ProcessingError::UnsupportedMode {
        container: container.name(),
        mode: image.color_mode().name(),
    })
}

fn flat_rgba(image: &CanonicalImage) -> Vec<u8> {
    image
        .to_rgba_pixels()
        .iter()
        .flat_map(|p| [p.r, p.g, p.b, p.a])
        .collect()
}

fn flat_rgb(image: &CanonicalImage) -> Vec<u8> {
    image
        .to_rgb_pixels()
        .iter()
        .flat_map(|p| [p.r, p.g, p.b])
        .collect()
}

/// Serializes `image` in `container` without touching the filesystem.
pub fn encode_to_vec(image: &CanonicalImage, container: Container) -> Result<Vec<u8>, EncodeIssue> {
    let mut buf = Vec::new();
    let (w, h) = (image.width, image.height);

    match (container, &image.pixels) {
        (Container::Png, PixelData::Rgba(_)) => {
            PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive)
                .write_image(&flat_rgba(image), w, h, ColorType::Rgba8)
                .map_err(codec_error)?;
        }
        (Container::Png, PixelData::Rgb(_)) => {
            PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive)
                .write_image(&flat_rgb(image), w, h, ColorType::Rgb8)
                .map_err(codec_error)?;
        }
        (Container::Png, PixelData::Indexed { palette, indices }) => {
            let palette_bytes: Vec<u8> = palette.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
            let mut encoder = png::Encoder::new(&mut buf, w, h);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_palette(palette_bytes);
            encoder.set_compression(png::Compression::Best);
            let mut writer = encoder.write_header().map_err(codec_error)?;
            writer.write_image_data(indices).map_err(codec_error)?;
            writer.finish().map_err(codec_error)?;
        }
        (Container::Bmp, PixelData::Rgba(_)) => {
            BmpEncoder::new(&mut buf)
                .encode(&flat_rgba(image), w, h, ColorType::Rgba8)
                .map_err(codec_error)?;
        }
        (Container::Bmp, PixelData::Rgb(_)) => {
            BmpEncoder::new(&mut buf)
                .encode(&flat_rgb(image), w, h, ColorType::Rgb8)
                .map_err(codec_error)?;
        }
        (Container::Bmp, PixelData::Indexed { palette, indices }) => {
            let table: Vec<[u8; 3]> = palette.iter().map(|c| [c.r, c.g, c.b]).collect();
            BmpEncoder::new(&mut buf)
                .encode_with_palette(indices, w, h, ColorType::L8, Some(table.as_slice()))
                .map_err(codec_error)?;
        }
        (Container::Jpeg, PixelData::Rgb(_)) => {
            JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
                .encode(&flat_rgb(image), w, h, ColorType::Rgb8)
                .map_err(codec_error)?;
        }
        (Container::Jpeg, _) => return Err(unsupported(container, image)),
    }

    if container == Container::Bmp {
        set_bmp_dpi(&mut buf, PRINTER_DPI);
    }
    Ok(buf)
}

fn dpi_to_ppm(dpi: u32) -> i32 {
    (dpi as f64 * INCHES_PER_METER).round() as i32
}

/// Overwrites the pixels-per-meter fields of a BMP info header.
pub fn set_bmp_dpi(bmp: &mut [u8], dpi: u32) -> bool {
    if bmp.len() < BMP_Y_PPM_OFFSET + 4 || &bmp[..2] != b"BM" {
        return false;
    }
    let ppm = dpi_to_ppm(dpi).to_le_bytes();
    bmp[BMP_X_PPM_OFFSET..BMP_X_PPM_OFFSET + 4].copy_from_slice(&ppm);
    bmp[BMP_Y_PPM_OFFSET..BMP_Y_PPM_OFFSET + 4].copy_from_slice(&ppm);
    true
}

/// Horizontal and vertical resolution stored in a BMP, in whole DPI.
pub fn read_bmp_dpi(bmp: &[u8]) -> Option<(u32, u32)> {
    if bmp.len() < BMP_Y_PPM_OFFSET + 4 || &bmp[..2] != b"BM" {
        return None;
    }
    let read = |at: usize| i32::from_le_bytes([bmp[at], bmp[at + 1], bmp[at + 2], bmp[at + 3]]);
    let to_dpi = |ppm: i32| (ppm.max(0) as f64 / INCHES_PER_METER).round() as u32;
    Some((to_dpi(read(BMP_X_PPM_OFFSET)), to_dpi(read(BMP_Y_PPM_OFFSET))))
}

fn write_atomic(destination: &Path, bytes: &[u8]) -> Result<(), EncodeError> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| EncodeError::write_failure(destination, e))?;
    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| EncodeError::write_failure(destination, e))?;
    output_permissions(destination, temp.as_file())
        .and_then(|perms| temp.as_file().set_permissions(perms))
        .map_err(|e| EncodeError::write_failure(destination, e))?;
    temp.persist(destination)
        .map_err(|e| EncodeError::write_failure(destination, e.error))?;
    Ok(())
}

/// Keeps the mode of a file being replaced; new files get a world-readable
/// mode instead of the owner-only one the temp file was created with.
#[cfg(unix)]
fn output_permissions(destination: &Path, _temp: &std::fs::File) -> std::io::Result<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;

    Ok(std::fs::metadata(destination)
        .map(|m| m.permissions())
        .unwrap_or_else(|_| std::fs::Permissions::from_mode(OUTPUT_FILE_MODE)))
}

#[cfg(not(unix))]
fn output_permissions(destination: &Path, temp: &std::fs::File) -> std::io::Result<std::fs::Permissions> {
    match std::fs::metadata(destination) {
        Ok(m) => Ok(m.permissions()),
        Err(_) => temp.metadata().map(|m| m.permissions()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_spec::ColorMode;
    use rgb::{RGB8, RGBA8};

    fn rgb_image(width: u32, height: u32, color: RGB8) -> CanonicalImage {
        CanonicalImage {
            width,
            height,
            pixels: PixelData::Rgb(vec![color; (width * height) as usize]),
        }
    }

    #[test]
    fn test_bmp_carries_printer_dpi() {
        let bytes = encode_to_vec(&rgb_image(155, 110, RGB8::new(255, 255, 255)), Container::Bmp).unwrap();
        assert_eq!(read_bmp_dpi(&bytes), Some((203, 203)));

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.color(), ColorType::Rgb8);
        assert_eq!((decoded.width(), decoded.height()), (155, 110));
    }

    #[test]
    fn test_dpi_conversion_matches_bmp_units() {
        assert_eq!(dpi_to_ppm(203), 7992);
        let mut header = vec![0u8; 54];
        header[..2].copy_from_slice(b"BM");
        assert!(set_bmp_dpi(&mut header, 203));
        assert_eq!(read_bmp_dpi(&header), Some((203, 203)));
        assert!(!set_bmp_dpi(&mut [0u8; 10], 203));
        assert_eq!(read_bmp_dpi(b"PNG"), None);
    }

    #[test]
    fn test_indexed_png_is_paletted() {
        let img = CanonicalImage {
            width: 3,
            height: 1,
            pixels: PixelData::Indexed {
                palette: vec![RGB8::new(0, 0, 0), RGB8::new(255, 0, 0)],
                indices: vec![0, 1, 1],
            },
        };
        let bytes = encode_to_vec(&img, Container::Png).unwrap();

        let decoder = png::Decoder::new(std::io::Cursor::new(&bytes));
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().color_type, png::ColorType::Indexed);
        assert_eq!(reader.info().palette.as_deref().map(|p| p.len()), Some(6));
    }

    #[test]
    fn test_indexed_bmp_decodes_back() {
        let img = CanonicalImage {
            width: 2,
            height: 2,
            pixels: PixelData::Indexed {
                palette: vec![RGB8::new(0, 0, 255), RGB8::new(255, 255, 0)],
                indices: vec![0, 1, 1, 0],
            },
        };
        let bytes = encode_to_vec(&img, Container::Bmp).unwrap();
        assert_eq!(read_bmp_dpi(&bytes), Some((203, 203)));
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(1, 0).0, [255, 255, 0]);
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_jpeg_rejects_alpha_pixels() {
        let img = CanonicalImage {
            width: 1,
            height: 1,
            pixels: PixelData::Rgba(vec![RGBA8::new(0, 0, 0, 0)]),
        };
        assert!(matches!(
            encode_to_vec(&img, Container::Jpeg),
            Err(EncodeIssue::Unsupported(ProcessingError::UnsupportedMode { .. }))
        ));
    }

    #[test]
    fn test_jpeg_encodes_rgb() {
        let bytes = encode_to_vec(&rgb_image(16, 16, RGB8::new(30, 60, 90)), Container::Jpeg).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_missing_parent_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("no_such_dir").join("Logo.png");
        let spec = FormatSpec::new(2, 2, ColorMode::Rgb, Container::Png);

        let result = encode(&rgb_image(2, 2, RGB8::new(1, 2, 3)), &spec, &dest);
        assert!(matches!(result, Err(PipelineError::Encode(EncodeError::WriteFailure { .. }))));
        assert!(!dest.exists());
    }

    #[test]
    fn test_encode_replaces_existing_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Logo.png");
        std::fs::write(&dest, b"stale").unwrap();
        let spec = FormatSpec::new(4, 4, ColorMode::Rgb, Container::Png);

        let output = encode(&rgb_image(4, 4, RGB8::new(9, 9, 9)), &spec, &dest).unwrap();
        assert_eq!(output.path, dest);
        assert_eq!(output.bytes_written, std::fs::metadata(&dest).unwrap().len());

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let decoded = image::open(&dest).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }

    #[cfg(unix)]
    #[test]
    fn test_new_output_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Logo.png");
        let spec = FormatSpec::new(4, 4, ColorMode::Rgb, Container::Png);
        encode(&rgb_image(4, 4, RGB8::new(9, 9, 9)), &spec, &dest).unwrap();

        let mode = std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_replaced_output_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("PRINTLOGO.bmp");
        std::fs::write(&dest, b"old").unwrap();
        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o664)).unwrap();

        let spec = FormatSpec::new(4, 4, ColorMode::Rgb, Container::Bmp);
        encode(&rgb_image(4, 4, RGB8::new(0, 0, 0)), &spec, &dest).unwrap();

        let mode = std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);
    }
}
