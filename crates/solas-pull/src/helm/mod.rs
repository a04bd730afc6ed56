//! Helm chart pulls from OCI registries and classic HTTP repositories

mod chart;
mod index;
mod oci;

pub use chart::{CHART_FILE, ChartMetadata};
pub use index::{ChartEntry, ChartIndex, compare_versions, is_stable, parse_version};
pub use oci::{OCI_SCHEME, OciReference, OciRegistryClient, RegistryClient, highest_version_tag, media_types};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use solas_core::{
    ArchiveExtractor, Artifact, LATEST, PullResult, Staging, first_non_empty, promote, safe_path,
};

use crate::credentials::ResolvedCredentials;
use crate::download::Downloader;
use crate::error::{PullError, Result, ResultExt};
use crate::strategy::{PullOption, Strategy, blocking, discard_staging, ensure_not_cancelled};

const METHOD: &str = "helm-chart";

/// Chart strategy
#[derive(Clone, Default)]
pub struct HelmChartStrategy {
    registry: Option<Arc<dyn RegistryClient>>,
    registry_auth: Option<ResolvedCredentials>,
    downloader: Option<Arc<dyn Downloader>>,
    extractor: ArchiveExtractor,
}

impl HelmChartStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: Arc<dyn RegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Credentials for the registry client created when none is injected
    pub fn with_registry_auth(mut self, auth: Option<ResolvedCredentials>) -> Self {
        self.registry_auth = auth;
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn with_extractor(mut self, extractor: ArchiveExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Pull `name` from an OCI registry, returning the version that was fetched
    async fn fetch_oci(
        &self,
        cancel: &CancellationToken,
        artifact: &Artifact,
        archive_path: &Path,
    ) -> Result<String> {
        let registry = match &self.registry {
            Some(registry) => Arc::clone(registry),
            None => Arc::new(OciRegistryClient::new(self.registry_auth.clone())),
        };
        let reference = OciReference::for_chart(&artifact.repository, &artifact.name)?;

        let version = if artifact.version.is_empty() {
            let tags = registry
                .list_tags(cancel, &reference)
                .await
                .context("listing chart tags")?;
            highest_version_tag(&tags)
                .ok_or_else(|| PullError::ChartNotFound {
                    name: artifact.name.clone(),
                    repository: artifact.repository.clone(),
                })?
                .to_string()
        } else {
            artifact.version.clone()
        };

        let bytes = registry
            .pull_chart(cancel, &reference, &version)
            .await
            .context("pulling chart")?;
        tokio::fs::write(archive_path, bytes).await?;
        Ok(version)
    }

    /// Pull `name` from an index-based repository, returning the version that was fetched
    async fn fetch_http(
        &self,
        cancel: &CancellationToken,
        artifact: &Artifact,
        staging: &Path,
        archive_path: &Path,
    ) -> Result<String> {
        let downloader = self.downloader.as_ref().ok_or(PullError::MissingCollaborator {
            collaborator: "downloader",
            method: METHOD,
        })?;

        let index_url = format!("{}/index.yaml", artifact.repository.trim_end_matches('/'));
        let index_path = staging.join("index.yaml");
        downloader
            .download(cancel, &index_url, &index_path)
            .await
            .context("downloading chart index")?;
        let index = ChartIndex::from_bytes(&std::fs::read(&index_path)?)?;

        let entry = if artifact.version.is_empty() {
            index.get_latest(&artifact.name).ok_or_else(|| PullError::ChartNotFound {
                name: artifact.name.clone(),
                repository: artifact.repository.clone(),
            })?
        } else {
            index
                .get_version(&artifact.name, &artifact.version)
                .ok_or_else(|| PullError::VersionNotFound {
                    name: artifact.name.clone(),
                    version: artifact.version.clone(),
                    repository: artifact.repository.clone(),
                })?
        };

        let chart_url = entry.download_url(&artifact.repository)?;
        downloader
            .download(cancel, &chart_url, archive_path)
            .await
            .context("downloading chart")?;
        Ok(entry.version.clone())
    }
}

/// The chart directory inside an unpacked chart archive
///
/// Charts are packaged under a top-level directory named after the chart.
fn chart_root(unpacked: &Path, name: &str) -> Result<PathBuf> {
    let named = unpacked.join(name);
    if named.join(CHART_FILE).is_file() {
        return Ok(named);
    }

    let mut dirs = std::fs::read_dir(unpacked)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.join(CHART_FILE).is_file());
    match (dirs.next(), dirs.next()) {
        (Some(only), None) => Ok(only),
        _ => Err(PullError::InvalidArtifact {
            message: format!("chart archive for {} has no single chart directory", name),
        }),
    }
}

#[async_trait]
impl Strategy for HelmChartStrategy {
    fn method(&self) -> &'static str {
        METHOD
    }

    fn apply(&mut self, option: &PullOption) {
        match option {
            PullOption::RegistryClient(registry) => self.registry = Some(Arc::clone(registry)),
            PullOption::RegistryAuth(auth) => self.registry_auth = Some(auth.clone()),
            PullOption::Downloader(downloader) => self.downloader = Some(Arc::clone(downloader)),
            _ => {}
        }
    }

    async fn pull(&self, cancel: &CancellationToken, artifact: &Artifact) -> Result<PullResult> {
        if artifact.repository.is_empty() {
            return Err(PullError::InvalidArtifact {
                message: format!("chart {} names no repository", artifact.name),
            });
        }
        ensure_not_cancelled(cancel)?;

        let staging = Staging::new()?;
        let archive_path = safe_path(staging.path(), format!("{}.tgz", artifact.name))?;

        let fetched = if artifact.repository.starts_with(OCI_SCHEME) {
            self.fetch_oci(cancel, artifact, &archive_path).await?
        } else {
            self.fetch_http(cancel, artifact, staging.path(), &archive_path)
                .await?
        };

        let unpacked = staging.path().join("charts");
        let extractor = self.extractor.clone();
        let (token, source, target) = (cancel.clone(), archive_path, unpacked.clone());
        blocking(move || {
            extractor
                .unpack_tree(&token, &source, &target)
                .context("uncompressing chart")
        })
        .await?;
        let root = chart_root(&unpacked, &artifact.name)?;
        let chart = ChartMetadata::load(&root).context("loading chart metadata")?;

        let destination = self.compute_destination(artifact, None);
        promote(&root, &destination).context("renaming directory")?;
        discard_staging(staging);

        let version = first_non_empty(&[chart.version.as_str(), fetched.as_str(), LATEST]);
        tracing::debug!("Installed chart {} {} at {}", chart.name, version, destination.display());
        Ok(PullResult::new(destination, version))
    }
}
