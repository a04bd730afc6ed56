//! GitHub release pulls
//!
//! A release is looked up by tag (or the latest one), one of its assets is
//! picked by name and extension, and the extracted contents are installed under
//! a directory named after the asset with its version and extensions removed.

mod client;

pub use client::{GitHubClient, Release, ReleaseAsset, ReleaseClient};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use solas_core::{
    ArchiveExtractor, Artifact, Extractor, PullResult, Staging, first_non_empty, is_archive,
    promote, release_dir_name, safe_path,
};

use crate::download::Downloader;
use crate::error::{PullError, Result, ResultExt};
use crate::strategy::{PullOption, Strategy, blocking, discard_staging, ensure_not_cancelled};

const METHOD: &str = "github-release";

/// Asset name suffixes in preference order; the bare name comes last
const ASSET_SUFFIXES: &[&str] = &[".zip", ".tgz", ".tar.gz", ""];

/// Pick the asset for `asset_name`
///
/// Each suffix is tried in preference order against the whole list, so a
/// `.zip` later in the list beats a `.tar.gz` earlier in it.
pub fn select_asset<'a>(assets: &'a [ReleaseAsset], asset_name: &str) -> Option<&'a ReleaseAsset> {
    ASSET_SUFFIXES.iter().find_map(|suffix| {
        let wanted = format!("{}{}", asset_name, suffix);
        assets.iter().find(|asset| asset.name == wanted)
    })
}

/// Split a repository locator into owner and name
///
/// Accepts `owner/repo` and `https://github.com/owner/repo[.git]`.
pub fn parse_repository(repository: &str) -> Result<(String, String)> {
    let trimmed = repository
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("github.com/")
        .trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    match trimmed.split('/').collect::<Vec<_>>().as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(PullError::InvalidArtifact {
            message: format!("repository must be owner/repo, got {:?}", repository),
        }),
    }
}

/// Release-asset strategy
#[derive(Clone)]
pub struct GitHubReleaseStrategy {
    client: Option<Arc<dyn ReleaseClient>>,
    downloader: Option<Arc<dyn Downloader>>,
    extractor: Arc<dyn Extractor>,
}

impl Default for GitHubReleaseStrategy {
    fn default() -> Self {
        Self {
            client: None,
            downloader: None,
            extractor: Arc::new(ArchiveExtractor::default()),
        }
    }
}

impl GitHubReleaseStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: Arc<dyn ReleaseClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }
}

#[async_trait]
impl Strategy for GitHubReleaseStrategy {
    fn method(&self) -> &'static str {
        METHOD
    }

    /// `base_dir / <asset file name without extensions or version>`
    fn compute_destination(&self, artifact: &Artifact, resolved_name: Option<&str>) -> PathBuf {
        let name = resolved_name
            .unwrap_or_else(|| first_non_empty(&[artifact.asset_name.as_str(), artifact.name.as_str()]));
        artifact.base_dir.join(release_dir_name(name))
    }

    fn apply(&mut self, option: &PullOption) {
        match option {
            PullOption::ReleaseClient(client) => self.client = Some(Arc::clone(client)),
            PullOption::Downloader(downloader) => self.downloader = Some(Arc::clone(downloader)),
            PullOption::Extractor(extractor) => self.extractor = Arc::clone(extractor),
            _ => {}
        }
    }

    async fn pull(&self, cancel: &CancellationToken, artifact: &Artifact) -> Result<PullResult> {
        let client = self.client.as_ref().ok_or(PullError::MissingCollaborator {
            collaborator: "GitHub client",
            method: METHOD,
        })?;
        let downloader = self.downloader.as_ref().ok_or(PullError::MissingCollaborator {
            collaborator: "downloader",
            method: METHOD,
        })?;
        let (owner, repo) = parse_repository(&artifact.repository)?;
        ensure_not_cancelled(cancel)?;

        let release = if artifact.version.is_empty() {
            client.get_latest_release(cancel, &owner, &repo).await
        } else {
            client
                .get_release_by_tag(cancel, &owner, &repo, &artifact.version)
                .await
        }
        .context("fetching release")?;

        let asset_name = first_non_empty(&[artifact.asset_name.as_str(), artifact.name.as_str()]);
        let asset = select_asset(&release.assets, asset_name).ok_or_else(|| {
            PullError::AssetNotFound {
                asset: asset_name.to_string(),
                release: release.tag_name.clone(),
            }
        })?;
        tracing::debug!("Selected asset {} from release {}", asset.name, release.tag_name);

        let staging = Staging::new()?;
        let download_path = safe_path(staging.path().join("downloads"), &asset.name)?;
        downloader
            .download(cancel, &asset.browser_download_url, &download_path)
            .await
            .context("downloading asset")?;

        let content_dir = staging.path().join("content");
        if is_archive(&asset.name) {
            let extractor = Arc::clone(&self.extractor);
            let (token, source, target) = (cancel.clone(), download_path, content_dir.clone());
            blocking(move || {
                extractor
                    .uncompress(&token, &source, &target)
                    .context("uncompressing asset")
            })
            .await?;
        } else {
            std::fs::create_dir_all(&content_dir)?;
            std::fs::rename(&download_path, content_dir.join(&asset.name))
                .context("placing asset")?;
        }

        let destination = self.compute_destination(artifact, Some(asset.name.as_str()));
        promote(&content_dir, &destination).context("renaming directory")?;
        discard_staging(staging);

        Ok(PullResult::new(destination, artifact.version_or_latest()))
    }
}
