use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors surfaced by the export/import pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A save document lacks a field (or has the wrong kind) that an export needs.
    #[error("malformed save: {0}")]
    MalformedSave(String),

    /// A package declares a category but its payload has the wrong shape.
    #[error("package field missing or invalid: {0}")]
    MissingPackageField(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Any other invalid argument (bad slot number, not a directory, ...).
    #[error("{0}")]
    Invalid(String),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

impl CoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        CoreError::Io { path: path.to_path_buf(), source }
    }

    pub(crate) fn zip(path: &Path, source: zip::result::ZipError) -> Self {
        CoreError::Zip { path: path.to_path_buf(), source }
    }
}
