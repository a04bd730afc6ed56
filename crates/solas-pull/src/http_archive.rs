//! Plain HTTP archive pulls

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use solas_core::{ArchiveExtractor, Artifact, Extractor, PullResult, Staging, is_archive, promote, safe_path};

use crate::download::Downloader;
use crate::error::{PullError, Result, ResultExt};
use crate::strategy::{PullOption, Strategy, blocking, discard_staging, ensure_not_cancelled};

const METHOD: &str = "http-archive";

/// Last path segment of `url`, ignoring query and fragment
pub fn url_file_name(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .unwrap_or_default(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or_default()
            .to_string(),
    }
}

/// Download-extract-install strategy for `.zip`, `.tgz` and `.tar.gz` URLs
#[derive(Clone)]
pub struct HttpArchiveStrategy {
    downloader: Option<Arc<dyn Downloader>>,
    extractor: Arc<dyn Extractor>,
}

impl Default for HttpArchiveStrategy {
    fn default() -> Self {
        Self {
            downloader: None,
            extractor: Arc::new(ArchiveExtractor::default()),
        }
    }
}

impl HttpArchiveStrategy {
    pub fn new() -> Self {
        Self::default()
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
impl Strategy for HttpArchiveStrategy {
    fn method(&self) -> &'static str {
        METHOD
    }

    fn apply(&mut self, option: &PullOption) {
        match option {
            PullOption::Downloader(downloader) => self.downloader = Some(Arc::clone(downloader)),
            PullOption::Extractor(extractor) => self.extractor = Arc::clone(extractor),
            _ => {}
        }
    }

    async fn pull(&self, cancel: &CancellationToken, artifact: &Artifact) -> Result<PullResult> {
        let downloader = self.downloader.as_ref().ok_or(PullError::MissingCollaborator {
            collaborator: "downloader",
            method: METHOD,
        })?;
        let file_name = url_file_name(&artifact.url);
        if !is_archive(&file_name) {
            return Err(PullError::NotAnArchive {
                url: artifact.url.clone(),
            });
        }
        ensure_not_cancelled(cancel)?;

        let staging = Staging::new()?;
        let download_path = safe_path(staging.path().join("downloads"), &file_name)?;
        downloader
            .download(cancel, &artifact.url, &download_path)
            .await
            .context("downloading archive")?;

        let content_dir = safe_path(staging.path(), &artifact.name)?;
        let extractor = Arc::clone(&self.extractor);
        let (token, source, target) = (cancel.clone(), download_path, content_dir.clone());
        blocking(move || {
            extractor
                .uncompress(&token, &source, &target)
                .context("uncompressing archive")
        })
        .await?;

        let destination = self.compute_destination(artifact, None);
        promote(&content_dir, &destination).context("renaming directory")?;
        discard_staging(staging);

        Ok(PullResult::new(destination, artifact.version_or_latest()))
    }
}
