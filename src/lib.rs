//! logocraft - logo renditions for point-of-sale hardware
//!
//! This library turns one source logo into the renditions that POS
//! terminals, kitchen displays and thermal receipt printers expect: exact
//! pixel sizes, color modes, flattened backgrounds and the 600x256 printer
//! bitmap with 203 DPI metadata.
//!
//! ## Pipeline
//!
//! - **Decode** any PNG, JPEG, BMP, GIF, TIFF or WebP source to RGBA once
//! - **Standard path**: stretch to size, convert mode, flatten, quantize
//! - **Thermal path**: flatten onto white, fit in 256x256, center on 600x256
//! - **Encode** to PNG, BMP or JPEG and write atomically
//!
//! ## Example
//!
//! ```rust,no_run
//! use logocraft::{load, process_catalog, Catalog};
//! use std::path::Path;
//!
//! let image = load(Path::new("logo.png"))?;
//! let report = process_catalog(&image, &Catalog::builtin(), Path::new("out"));
//! for entry in &report.entries {
//!     println!("{}: {}", entry.name, if entry.result.is_ok() { "ok" } else { "failed" });
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compositor;
pub mod config;
pub mod encoder;
pub mod error;
pub mod format_spec;
pub mod image_processor;
pub mod quantizer;
pub mod thermal;

pub use config::AppConfig;
pub use encoder::{read_bmp_dpi, RenderOutput, PRINTER_DPI};
pub use error::{ConfigError, DecodeError, EncodeError, PipelineError, ProcessingError};
pub use format_spec::{Catalog, CatalogEntry, ColorMode, Container, FormatSpec};
pub use image_processor::{load_image, load_image_from_bytes, CanonicalImage, PixelData};
pub use quantizer::quantize;

use rayon::prelude::*;
use std::path::Path;

/// Decodes a source image into its canonical RGBA form.
pub fn load(path: &Path) -> Result<CanonicalImage, DecodeError> {
    load_image(path)
}

/// Produces the final pixels for `spec` without encoding them.
pub fn render(image: &CanonicalImage, spec: &FormatSpec) -> Result<CanonicalImage, ProcessingError> {
    let spec = spec.normalized();
    spec.validate()?;
    image.check_layout()?;
    if spec.thermal_layout {
        thermal::render_thermal(image)
    } else {
        compositor::render_standard(image, &spec)
    }
}

/// Renders `image` for `spec` and writes it to `destination`.
pub fn process(image: &CanonicalImage, spec: &FormatSpec, destination: &Path) -> Result<RenderOutput, PipelineError> {
    let spec = spec.normalized();
    let rendered = render(image, &spec)?;
    encoder::encode(&rendered, &spec, destination)
}

/// Outcome of one catalog entry.
#[derive(Debug)]
pub struct EntryOutcome {
    pub name: String,
    pub result: Result<RenderOutput, PipelineError>,
}

/// Per-entry results of a catalog run, in catalog order.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub entries: Vec<EntryOutcome>,
}

impl RenderReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.entries.iter().filter(|e| e.result.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.entries.iter().filter(|e| e.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Renders every catalog entry into `out_dir`, named after the entry.
///
/// Entries run in parallel over the same decoded image. A failing entry is
/// recorded and does not stop the others.
pub fn process_catalog(image: &CanonicalImage, catalog: &Catalog, out_dir: &Path) -> RenderReport {
    let entries = catalog
        .entries()
        .par_iter()
        .map(|entry| {
            let _span = tracing::info_span!("format", name = %entry.name).entered();
            let destination = out_dir.join(&entry.name);
            let result = process(image, &entry.spec, &destination);
            if let Err(e) = &result {
                tracing::warn!(error = %e, "rendition failed");
            }
            EntryOutcome {
                name: entry.name.clone(),
                result,
            }
        })
        .collect();
    RenderReport { entries }
}
