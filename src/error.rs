//! Typed failures for every pipeline stage.
//!
//! Each stage has its own enum so callers can tell a bad input file from a
//! bad format descriptor from a full disk. [`PipelineError`] wraps them for
//! the `process` entry points.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot read image '{path}': {reason}")]
    UnreadableFile { path: PathBuf, reason: String },

    #[error("unsupported file extension '{extension}' for '{path}'")]
    UnsupportedExtension { path: PathBuf, extension: String },
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("invalid geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    #[error("quantization failed: {0}")]
    QuantizationFailure(String),

    #[error("{container} output does not support {mode} pixels")]
    UnsupportedMode {
        container: &'static str,
        mode: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to write '{path}': {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EncodeError {
    pub(crate) fn write_failure(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EncodeError::WriteFailure {
            path: path.into(),
            source,
        }
    }
}

/// Any failure of a single `process` call.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid format '{name}': {source}")]
    InvalidFormat {
        name: String,
        #[source]
        source: ProcessingError,
    },
}
