//! Error types for the export pipeline.

use std::path::PathBuf;

/// Top-level error for an export attempt.
///
/// Per-link problems never surface here; they are reported as
/// [`crate::links::LinkProjectionError`] and skipped.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Rasterizing the node failed (detached node, zero size, refused remote image, ...).
    #[error("Capture failed: {message}")]
    Capture { message: String },

    /// Building the PDF from the raster failed.
    #[error("Assembly failed: {message}")]
    Assembly { message: String },

    /// Another export is still running on the same exporter.
    #[error("An export is already in progress")]
    Busy,

    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias using ExportError.
pub type ExportResult<T> = Result<T, ExportError>;

impl ExportError {
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn assembly(msg: impl Into<String>) -> Self {
        Self::Assembly {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
