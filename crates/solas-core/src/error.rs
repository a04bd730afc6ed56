//! Core error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("not a compressed file: {name}")]
    NotAnArchive { name: String },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("path {} escapes root {}", path.display(), root.display())]
    PathEscape { root: PathBuf, path: PathBuf },

    #[error("path traversal in archive entry {entry:?}")]
    PathTraversal { entry: String },

    #[error("archive entry {entry:?} exceeds the {limit} byte limit")]
    SizeLimitExceeded { entry: String, limit: u64 },

    #[error("archive error: {message}")]
    Archive { message: String },

    #[error("destination {} already exists", path.display())]
    DestinationExists { path: PathBuf },

    #[error("failed to remove staging directory {}: {source}", path.display())]
    StagingCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for CoreError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => CoreError::Io(io),
            other => CoreError::Archive {
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
