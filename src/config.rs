//! Application settings and the JSON catalog file.
//!
//! Settings are an explicit value handed to whoever needs them; nothing here
//! is global. Keys missing from a file fall back to [`AppConfig::default`].

use crate::error::{ConfigError, DecodeError};
use crate::format_spec::{Catalog, FormatSpec};
use crate::image_processor::{is_supported_extension, load_image_with, CanonicalImage, SUPPORTED_EXTENSIONS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub formats: Catalog,
    pub supported_formats: Vec<String>,
    pub default_output_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            formats: Catalog::builtin(),
            supported_formats: SUPPORTED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            default_output_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::info!(path = %path.display(), formats = config.formats.len(), "configuration loaded");
        Ok(config)
    }

    /// Writes the config as pretty JSON, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)?;
        tracing::info!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for entry in self.formats.entries() {
            entry.spec.validate().map_err(|source| ConfigError::InvalidFormat {
                name: entry.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn format(&self, name: &str) -> Option<&FormatSpec> {
        self.formats.get(name)
    }

    pub fn validate_format(&self, name: &str) -> bool {
        self.formats.contains(name)
    }

    /// Decodes a source image under this config's extension policy.
    pub fn load_source(&self, path: &Path) -> Result<CanonicalImage, DecodeError> {
        load_image_with(path, self.supported_formats.as_slice())
    }

    /// True when `path` exists and carries an accepted extension.
    pub fn is_supported_file(&self, path: &Path) -> bool {
        path.is_file() && is_supported_extension(path, self.supported_formats.as_slice())
    }
}

/// True when `path` is an existing directory that is not read-only.
pub fn is_writable_dir(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false)
}
