//! Output target descriptors and the built-in logo catalog.
//!
//! A [`FormatSpec`] is plain data: it says what a rendition must look like,
//! never how to produce it. The serde field names (`mode`, `format`,
//! `colors`, `is_thermal_printer`) match existing catalog files.

use crate::error::ProcessingError;
use serde::{Deserialize, Serialize};

/// Thermal printer canvas size, forced onto every thermal spec.
pub const THERMAL_DIMENSIONS: (u32, u32) = (600, 256);

/// Largest palette an indexed output can carry.
pub const MAX_PALETTE_COLORS: u16 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorMode {
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "RGBA")]
    Rgba,
    #[serde(rename = "P", alias = "INDEXED")]
    Indexed,
}

impl ColorMode {
    pub fn name(self) -> &'static str {
        match self {
            ColorMode::Rgb => "RGB",
            ColorMode::Rgba => "RGBA",
            ColorMode::Indexed => "indexed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Container {
    Png,
    Bmp,
    Jpeg,
}

impl Container {
    pub fn name(self) -> &'static str {
        match self {
            Container::Png => "PNG",
            Container::Bmp => "BMP",
            Container::Jpeg => "JPEG",
        }
    }
}

/// Description of one output rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub dimensions: (u32, u32),
    #[serde(rename = "mode")]
    pub color_mode: ColorMode,
    #[serde(rename = "format")]
    pub container: Container,
    #[serde(rename = "colors", default, skip_serializing_if = "Option::is_none")]
    pub palette_colors: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<[u8; 3]>,
    #[serde(rename = "is_thermal_printer", default)]
    pub thermal_layout: bool,
}

impl FormatSpec {
    pub fn new(width: u32, height: u32, color_mode: ColorMode, container: Container) -> Self {
        Self {
            dimensions: (width, height),
            color_mode,
            container,
            palette_colors: None,
            background: None,
            thermal_layout: false,
        }
    }

    /// The 600x256 printer bitmap. Layout, container and mode are fixed.
    pub fn thermal() -> Self {
        Self {
            dimensions: THERMAL_DIMENSIONS,
            color_mode: ColorMode::Rgb,
            container: Container::Bmp,
            palette_colors: None,
            background: Some([255, 255, 255]),
            thermal_layout: true,
        }
    }

    pub fn with_background(mut self, rgb: [u8; 3]) -> Self {
        self.background = Some(rgb);
        self
    }

    pub fn with_palette(mut self, colors: u16) -> Self {
        self.color_mode = ColorMode::Indexed;
        self.palette_colors = Some(colors);
        self
    }

    /// Applies the overrides implied by `thermal_layout`.
    pub fn normalized(&self) -> FormatSpec {
        if !self.thermal_layout {
            return self.clone();
        }
        FormatSpec {
            dimensions: THERMAL_DIMENSIONS,
            color_mode: ColorMode::Rgb,
            container: Container::Bmp,
            palette_colors: None,
            background: self.background,
            thermal_layout: true,
        }
    }

    /// Palette budget for indexed output.
    pub fn palette_budget(&self) -> usize {
        self.palette_colors.unwrap_or(MAX_PALETTE_COLORS) as usize
    }

    pub fn validate(&self) -> Result<(), ProcessingError> {
        let spec = self.normalized();
        let (width, height) = spec.dimensions;
        if width == 0 || height == 0 {
            return Err(ProcessingError::InvalidGeometry { width, height });
        }

        if let Some(colors) = spec.palette_colors {
            if spec.color_mode != ColorMode::Indexed {
                return Err(ProcessingError::QuantizationFailure(format!(
                    "palette of {colors} colors requires indexed mode, not {}",
                    spec.color_mode.name()
                )));
            }
            if colors == 0 || colors > MAX_PALETTE_COLORS {
                return Err(ProcessingError::QuantizationFailure(format!(
                    "palette size must be within 1..={MAX_PALETTE_COLORS}, got {colors}"
                )));
            }
        }

        if spec.container == Container::Jpeg && spec.color_mode != ColorMode::Rgb {
            return Err(ProcessingError::UnsupportedMode {
                container: spec.container.name(),
                mode: spec.color_mode.name(),
            });
        }

        Ok(())
    }
}

/// A named catalog entry. The name doubles as the output file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(flatten)]
    pub spec: FormatSpec,
}

/// Ordered, immutable set of output targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// The five renditions the POS, kitchen display and printer hardware expect.
    pub fn builtin() -> Self {
        let entry = |name: &str, spec: FormatSpec| CatalogEntry {
            name: name.to_string(),
            spec,
        };
        Self::new(vec![
            entry("Logo.png", FormatSpec::new(300, 300, ColorMode::Rgba, Container::Png)),
            entry("Smalllogo.png", FormatSpec::new(136, 136, ColorMode::Rgba, Container::Png)),
            entry("KDlogo.png", FormatSpec::new(140, 112, ColorMode::Rgba, Container::Png)),
            entry(
                "RPTlogo.bmp",
                FormatSpec::new(155, 110, ColorMode::Rgb, Container::Bmp)
                    .with_background([255, 255, 255]),
            ),
            entry("PRINTLOGO.bmp", FormatSpec::thermal()),
        ])
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FormatSpec> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Sub-catalog of the requested names, in catalog order, plus the names
    /// that matched nothing.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> (Catalog, Vec<String>) {
        let selected = self
            .entries
            .iter()
            .filter(|e| names.iter().any(|n| n.as_ref() == e.name))
            .cloned()
            .collect();
        let unknown = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| !self.contains(n))
            .map(str::to_string)
            .collect();
        (Catalog::new(selected), unknown)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
