//! CLI error types with exit code handling
//!
//! Pull errors are classified by [`ErrorKind`] and mapped to a diagnostic and
//! an exit code.

use miette::Diagnostic;
use thiserror::Error;

use solas_pull::{ErrorKind, PullError};

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Configuration file or collaborator problem
    #[error("Configuration error: {message}")]
    #[diagnostic(code(solas::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The pull cannot be served as requested
    #[error("{message}")]
    #[diagnostic(code(solas::cli::precondition))]
    Precondition {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Network or remote-service failure
    #[error("{message}")]
    #[diagnostic(code(solas::cli::remote))]
    Remote { message: String },

    /// Archive could not be extracted safely
    #[error("{message}")]
    #[diagnostic(code(solas::cli::archive))]
    Archive { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(solas::cli::io))]
    Io { message: String },

    /// Invalid command-line input
    #[error("{message}")]
    #[diagnostic(code(solas::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Staging residue could not be removed
    #[error("{message}")]
    #[diagnostic(
        code(solas::cli::corrupted_state),
        help("remove leftover solas-* directories from the system temp directory")
    )]
    CorruptedState { message: String },

    #[error("Interrupted")]
    #[diagnostic(code(solas::cli::cancelled))]
    Cancelled,

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(solas::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Precondition { .. } => exit_codes::PRECONDITION_ERROR,
            CliError::Remote { .. } => exit_codes::REMOTE_ERROR,
            CliError::Archive { .. } => exit_codes::ARCHIVE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::CorruptedState { .. } | CliError::Internal { .. } => exit_codes::ERROR,
            CliError::Cancelled => exit_codes::CANCELLED,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a usage error with help text
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

/// Hint shown under a precondition failure
fn precondition_help(err: &PullError) -> Option<String> {
    match err.root() {
        PullError::DestinationExists { .. } => {
            Some("remove the directory or pull under a different --name".to_string())
        }
        PullError::NotAnArchive { .. } => {
            Some("http-archive pulls accept .zip, .tgz and .tar.gz URLs".to_string())
        }
        PullError::JsonnetFileNotFound { .. } => {
            Some("create a jsonnetfile.json in the project directory first".to_string())
        }
        _ => None,
    }
}

impl From<PullError> for CliError {
    fn from(err: PullError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Configuration => CliError::Config {
                message,
                help: Some("check the configuration file and credentials".to_string()),
            },
            ErrorKind::Precondition => CliError::Precondition {
                help: precondition_help(&err),
                message,
            },
            ErrorKind::Remote => CliError::Remote { message },
            ErrorKind::Archive => CliError::Archive { message },
            ErrorKind::LocalIo => CliError::Io { message },
            ErrorKind::CorruptedState => CliError::CorruptedState { message },
            ErrorKind::Cancelled => CliError::Cancelled,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_pull_error_mapping() {
        let err: CliError = PullError::DestinationExists {
            path: PathBuf::from("/tmp/tool"),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::PRECONDITION_ERROR);
        assert!(err.to_string().contains("artifact directory already exists"));

        let err: CliError = PullError::Cancelled.into();
        assert_eq!(err.exit_code(), exit_codes::CANCELLED);

        let err: CliError = PullError::HttpError {
            status: 404,
            message: "not found".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::REMOTE_ERROR);
    }

    #[test]
    fn test_missing_collaborator_is_config() {
        let err: CliError = PullError::MissingCollaborator {
            collaborator: "downloader",
            method: "http-archive",
        }
        .into();
        assert!(matches!(err, CliError::Config { .. }));
    }
}
