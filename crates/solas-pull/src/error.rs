//! Error types for pull operations

use std::path::PathBuf;

use solas_core::CoreError;
use thiserror::Error;

/// Pull operation errors
#[derive(Debug, Error)]
pub enum PullError {
    // ============ Configuration Errors ============
    #[error("no {collaborator} configured for {method} pulls")]
    MissingCollaborator {
        collaborator: &'static str,
        method: &'static str,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ Precondition Errors ============
    #[error("artifact directory already exists: {}", path.display())]
    DestinationExists { path: PathBuf },

    #[error("subdir must be a local path: {sub_dir}")]
    SubdirNotLocal { sub_dir: String },

    #[error("subdir {sub_dir} not found in repository")]
    SubdirNotFound { sub_dir: String },

    #[error("not a compressed file: {url}")]
    NotAnArchive { url: String },

    #[error("unknown pull method: {method}")]
    UnknownMethod { method: String },

    #[error("Invalid artifact: {message}")]
    InvalidArtifact { message: String },

    #[error("jsonnet file not found: {}", path.display())]
    JsonnetFileNotFound { path: PathBuf },

    #[error("Invalid dependency {spec}: {reason}")]
    InvalidDependency { spec: String, reason: String },

    // ============ Remote Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Authentication required for {url}")]
    AuthRequired { url: String },

    #[error("Authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("Rate limited by server. Retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("release {tag} not found in {repository}")]
    ReleaseNotFound { repository: String, tag: String },

    #[error("asset not found: {asset} in release {release}")]
    AssetNotFound { asset: String, release: String },

    #[error("Chart not found: {name} in repository {repository}")]
    ChartNotFound { name: String, repository: String },

    #[error("Version not found: {name}@{version} in repository {repository}")]
    VersionNotFound {
        name: String,
        version: String,
        repository: String,
    },

    #[error("OCI registry error: {message}")]
    OciError { message: String },

    #[error("Invalid OCI reference: {reference}")]
    InvalidOciReference { reference: String },

    #[error("git error: {message}")]
    Git { message: String },

    #[error("failed to checkout commit {commit}: {message}")]
    CheckoutFailed { commit: String, message: String },

    // ============ Local Errors ============
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("operation cancelled")]
    Cancelled,

    // ============ Wrapping ============
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<PullError>,
    },
}

/// Result type for pull operations
pub type Result<T> = std::result::Result<T, PullError>;

/// Coarse classification of a [`PullError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required collaborator or setting is missing
    Configuration,
    /// The request cannot be served as given
    Precondition,
    /// Network or remote-service failure
    Remote,
    /// Archive format, traversal or size-cap failure
    Archive,
    /// Local filesystem failure
    LocalIo,
    /// Staging residue that could not be removed
    CorruptedState,
    /// The cancellation token fired
    Cancelled,
}

impl PullError {
    /// Classify this error, looking through context wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            PullError::MissingCollaborator { .. } | PullError::InvalidConfig { .. } => {
                ErrorKind::Configuration
            }
            PullError::DestinationExists { .. }
            | PullError::SubdirNotLocal { .. }
            | PullError::SubdirNotFound { .. }
            | PullError::NotAnArchive { .. }
            | PullError::UnknownMethod { .. }
            | PullError::InvalidArtifact { .. }
            | PullError::JsonnetFileNotFound { .. }
            | PullError::InvalidDependency { .. } => ErrorKind::Precondition,
            PullError::HttpError { .. }
            | PullError::NetworkError { .. }
            | PullError::AuthRequired { .. }
            | PullError::AuthFailed { .. }
            | PullError::RateLimited { .. }
            | PullError::ReleaseNotFound { .. }
            | PullError::AssetNotFound { .. }
            | PullError::ChartNotFound { .. }
            | PullError::VersionNotFound { .. }
            | PullError::OciError { .. }
            | PullError::InvalidOciReference { .. }
            | PullError::Git { .. }
            | PullError::CheckoutFailed { .. } => ErrorKind::Remote,
            PullError::Core(core) => match core {
                CoreError::NotAnArchive { .. }
                | CoreError::InvalidPath { .. }
                | CoreError::DestinationExists { .. } => ErrorKind::Precondition,
                CoreError::PathEscape { .. }
                | CoreError::PathTraversal { .. }
                | CoreError::SizeLimitExceeded { .. }
                | CoreError::Archive { .. } => ErrorKind::Archive,
                CoreError::StagingCleanup { .. } => ErrorKind::CorruptedState,
                CoreError::Cancelled => ErrorKind::Cancelled,
                CoreError::YamlParse(_)
                | CoreError::JsonParse(_)
                | CoreError::Io(_) => ErrorKind::LocalIo,
            },
            PullError::Io(_) | PullError::Serialization(_) => ErrorKind::LocalIo,
            PullError::Cancelled => ErrorKind::Cancelled,
            PullError::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error beneath any context wrappers
    pub fn root(&self) -> &PullError {
        match self {
            PullError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attach a one-line context noun to an error
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<PullError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PullError::Context {
            context: context.into(),
            source: Box::new(e.into()),
        })
    }
}

impl From<reqwest::Error> for PullError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            PullError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            PullError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            PullError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for PullError {
    fn from(e: serde_yaml::Error) -> Self {
        PullError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for PullError {
    fn from(e: serde_json::Error) -> Self {
        PullError::Serialization(e.to_string())
    }
}

impl From<git2::Error> for PullError {
    fn from(e: git2::Error) -> Self {
        PullError::Git {
            message: e.message().to_string(),
        }
    }
}

impl From<url::ParseError> for PullError {
    fn from(e: url::ParseError) -> Self {
        PullError::InvalidArtifact {
            message: format!("invalid URL: {}", e),
        }
    }
}
