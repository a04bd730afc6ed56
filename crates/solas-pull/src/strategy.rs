//! The per-method pull contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use solas_core::{Artifact, Extractor, PullResult, Staging};

use crate::credentials::ResolvedCredentials;
use crate::download::Downloader;
use crate::error::{PullError, Result};
use crate::git::GitClient;
use crate::github::ReleaseClient;
use crate::helm::RegistryClient;

/// Pull methods served by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullMethod {
    HelmChart,
    GithubRelease,
    HttpArchive,
    Git,
}

impl PullMethod {
    pub const ALL: [PullMethod; 4] = [
        PullMethod::HelmChart,
        PullMethod::GithubRelease,
        PullMethod::HttpArchive,
        PullMethod::Git,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PullMethod::HelmChart => "helm-chart",
            PullMethod::GithubRelease => "github-release",
            PullMethod::HttpArchive => "http-archive",
            PullMethod::Git => "git",
        }
    }
}

impl fmt::Display for PullMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PullMethod {
    type Err = PullError;

    fn from_str(s: &str) -> Result<Self> {
        PullMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| PullError::UnknownMethod {
                method: s.to_string(),
            })
    }
}

/// Collaborator overrides applied to a single pull
#[derive(Clone)]
pub enum PullOption {
    Downloader(Arc<dyn Downloader>),
    Extractor(Arc<dyn Extractor>),
    GitClient(Arc<dyn GitClient>),
    GitAuth(ResolvedCredentials),
    ReleaseClient(Arc<dyn ReleaseClient>),
    RegistryClient(Arc<dyn RegistryClient>),
    RegistryAuth(ResolvedCredentials),
}

impl fmt::Debug for PullOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PullOption::Downloader(_) => "Downloader",
            PullOption::Extractor(_) => "Extractor",
            PullOption::GitClient(_) => "GitClient",
            PullOption::GitAuth(_) => "GitAuth",
            PullOption::ReleaseClient(_) => "ReleaseClient",
            PullOption::RegistryClient(_) => "RegistryClient",
            PullOption::RegistryAuth(_) => "RegistryAuth",
        };
        f.write_str(name)
    }
}

/// One way of fetching an artifact
///
/// A strategy value doubles as its method's option bundle: it owns the
/// collaborators it needs and nothing else.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Method name used in errors and logs
    fn method(&self) -> &'static str;

    /// Where a successful pull installs the artifact
    ///
    /// `resolved_name` carries a name only known once the remote was queried,
    /// such as a release asset file name.
    fn compute_destination(&self, artifact: &Artifact, resolved_name: Option<&str>) -> PathBuf {
        let _ = resolved_name;
        artifact.destination_directory()
    }

    /// Apply a pull-scoped override; options a strategy has no use for are ignored
    fn apply(&mut self, option: &PullOption) {
        let _ = option;
    }

    async fn pull(&self, cancel: &CancellationToken, artifact: &Artifact) -> Result<PullResult>;
}

/// Fail fast when cancellation fired before any work started
pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(PullError::Cancelled)
    } else {
        Ok(())
    }
}

/// Run filesystem or libgit2 work on the blocking pool
///
/// Extraction and checkout walk whole trees; running them inline would stall
/// every other task on the same runtime worker.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PullError::Io(std::io::Error::other(format!("blocking task failed: {}", e))))?
}

/// Remove a staging directory once its content was promoted
///
/// The artifact is already installed at this point, so a cleanup failure is
/// logged rather than reported as a failed pull.
pub(crate) fn discard_staging(staging: Staging) {
    if let Err(e) = staging.close() {
        tracing::warn!("Failed to remove staging directory: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_round_trip() {
        for method in PullMethod::ALL {
            assert_eq!(method.as_str().parse::<PullMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_unknown_method() {
        let err = "ftp".parse::<PullMethod>().unwrap_err();
        assert_eq!(err.to_string(), "unknown pull method: ftp");
        assert!(matches!(err, PullError::UnknownMethod { .. }));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_blocking_returns_work_result() {
        let value = blocking(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);

        let err = blocking(|| -> Result<()> { Err(PullError::Cancelled) })
            .await
            .unwrap_err();
        assert!(matches!(err, PullError::Cancelled));
    }

    #[tokio::test]
    async fn test_blocking_reports_panicked_work() {
        let err = blocking(|| -> Result<()> { panic!("boom") }).await.unwrap_err();
        assert!(err.to_string().contains("blocking task failed"));
    }

    #[test]
    fn test_discard_staging_tolerates_cleanup_failure() {
        let staging = Staging::new().unwrap();
        let path = staging.path().to_path_buf();
        std::fs::remove_dir_all(&path).unwrap();

        // Closing an already removed directory fails; discarding must not
        discard_staging(staging);
        assert!(!path.exists());
    }

    #[test]
    fn test_method_serde() {
        let method: PullMethod = serde_yaml::from_str("github-release").unwrap();
        assert_eq!(method, PullMethod::GithubRelease);
    }
}
