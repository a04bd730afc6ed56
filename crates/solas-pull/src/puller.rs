//! Dispatcher over the per-method strategies

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use solas_core::{ArchiveExtractor, Artifact, Extractor, PullResult};

use crate::config::SolasConfig;
use crate::credentials::{ResolvedCredentials, ScopedCredentials};
use crate::download::{Downloader, HttpDownloader};
use crate::error::{PullError, Result};
use crate::git::{Git2Client, GitClient, GitStrategy};
use crate::github::{GitHubClient, GitHubReleaseStrategy, ReleaseClient};
use crate::helm::{HelmChartStrategy, RegistryClient};
use crate::http_archive::HttpArchiveStrategy;
use crate::strategy::{PullMethod, PullOption, Strategy};

/// Pulls artifacts by method name
///
/// Holds one configured strategy per method. A `Puller` is immutable once
/// built; per-call [`PullOption`]s are applied to a copy of the strategy.
#[derive(Clone)]
pub struct Puller {
    span: Span,
    helm: HelmChartStrategy,
    github: GitHubReleaseStrategy,
    http: HttpArchiveStrategy,
    git: GitStrategy,
    /// Matched against Git remotes and OCI repositories on each pull
    credentials: ScopedCredentials,
}

impl Default for Puller {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Puller {
    pub fn builder() -> PullerBuilder {
        PullerBuilder::default()
    }

    /// Puller wired with the default network collaborators
    pub fn from_config(config: &SolasConfig) -> Result<Self> {
        let credentials = config.scoped_credentials()?;
        let github_auth = config.github.resolved_token();
        let downloader = HttpDownloader::new(credentials.clone())?;
        let release_client = GitHubClient::new(&config.github.api_url, github_auth)?;

        Ok(Self::builder()
            .downloader(Arc::new(downloader))
            .archive_extractor(ArchiveExtractor::new().with_max_file_size(config.max_file_size))
            .git_client(Arc::new(Git2Client::new()))
            .release_client(Arc::new(release_client))
            .scoped_credentials(credentials)
            .build())
    }

    /// Credentials scoped to the artifact's source, ahead of caller options
    fn scoped_options(&self, method: PullMethod, artifact: &Artifact) -> Option<PullOption> {
        match method {
            PullMethod::Git => self
                .credentials
                .for_url(&artifact.url)
                .map(|auth| PullOption::GitAuth(auth.clone())),
            PullMethod::HelmChart => self
                .credentials
                .for_url(&artifact.repository)
                .map(|auth| PullOption::RegistryAuth(auth.clone())),
            PullMethod::GithubRelease | PullMethod::HttpArchive => None,
        }
    }

    fn strategy(&self, method: PullMethod) -> Box<dyn Strategy> {
        match method {
            PullMethod::HelmChart => Box::new(self.helm.clone()),
            PullMethod::GithubRelease => Box::new(self.github.clone()),
            PullMethod::HttpArchive => Box::new(self.http.clone()),
            PullMethod::Git => Box::new(self.git.clone()),
        }
    }

    /// Pull `artifact` with the puller's own collaborators
    pub async fn pull(
        &self,
        cancel: &CancellationToken,
        method: PullMethod,
        artifact: &Artifact,
    ) -> Result<PullResult> {
        self.pull_with(cancel, method, artifact, &[]).await
    }

    /// Pull `artifact`, overriding collaborators for this call only
    pub async fn pull_with(
        &self,
        cancel: &CancellationToken,
        method: PullMethod,
        artifact: &Artifact,
        options: &[PullOption],
    ) -> Result<PullResult> {
        let destination = artifact.destination_directory();
        if destination.symlink_metadata().is_ok() {
            return Err(PullError::DestinationExists { path: destination });
        }

        let mut strategy = self.strategy(method);
        if let Some(option) = self.scoped_options(method, artifact) {
            strategy.apply(&option);
        }
        for option in options {
            strategy.apply(option);
        }

        let span = tracing::info_span!(
            parent: &self.span,
            "pull",
            method = %method,
            artifact = %artifact.name
        );
        async move {
            tracing::debug!("Pulling {} into {}", artifact.name, artifact.base_dir.display());
            let result = strategy.pull(cancel, artifact).await?;
            tracing::info!(
                "Pulled {} {} to {}",
                artifact.name,
                result.version,
                result.directory.display()
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }
}

/// Builder for [`Puller`]
///
/// Collaborators left unset are missing for the methods that need them, except
/// the extractor and the OCI registry client which have defaults.
#[derive(Default)]
pub struct PullerBuilder {
    span: Option<Span>,
    downloader: Option<Arc<dyn Downloader>>,
    extractor: Option<Arc<dyn Extractor>>,
    archive_extractor: Option<ArchiveExtractor>,
    git_client: Option<Arc<dyn GitClient>>,
    git_auth: Option<ResolvedCredentials>,
    release_client: Option<Arc<dyn ReleaseClient>>,
    registry_client: Option<Arc<dyn RegistryClient>>,
    registry_auth: Option<ResolvedCredentials>,
    credentials: ScopedCredentials,
}

impl PullerBuilder {
    /// Parent span of every pull span
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Extractor for release assets and HTTP archives
    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Built-in extractor for every method, including Helm charts
    pub fn archive_extractor(mut self, extractor: ArchiveExtractor) -> Self {
        self.archive_extractor = Some(extractor);
        self
    }

    pub fn git_client(mut self, client: Arc<dyn GitClient>) -> Self {
        self.git_client = Some(client);
        self
    }

    pub fn git_auth(mut self, auth: ResolvedCredentials) -> Self {
        self.git_auth = Some(auth);
        self
    }

    pub fn release_client(mut self, client: Arc<dyn ReleaseClient>) -> Self {
        self.release_client = Some(client);
        self
    }

    pub fn registry_client(mut self, client: Arc<dyn RegistryClient>) -> Self {
        self.registry_client = Some(client);
        self
    }

    pub fn registry_auth(mut self, auth: ResolvedCredentials) -> Self {
        self.registry_auth = Some(auth);
        self
    }

    /// Credentials picked per pull by Git remote or chart repository prefix
    pub fn scoped_credentials(mut self, credentials: ScopedCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn build(self) -> Puller {
        let archive = self.archive_extractor.unwrap_or_default();
        let extractor: Arc<dyn Extractor> = self
            .extractor
            .unwrap_or_else(|| Arc::new(archive.clone()));

        let mut helm = HelmChartStrategy::new()
            .with_extractor(archive)
            .with_registry_auth(self.registry_auth);
        let mut github = GitHubReleaseStrategy::new().with_extractor(Arc::clone(&extractor));
        let mut http = HttpArchiveStrategy::new().with_extractor(extractor);
        let mut git = GitStrategy::new().with_auth(self.git_auth);

        if let Some(downloader) = self.downloader {
            helm = helm.with_downloader(Arc::clone(&downloader));
            github = github.with_downloader(Arc::clone(&downloader));
            http = http.with_downloader(downloader);
        }
        if let Some(client) = self.registry_client {
            helm = helm.with_registry(client);
        }
        if let Some(client) = self.release_client {
            github = github.with_client(client);
        }
        if let Some(client) = self.git_client {
            git = git.with_client(client);
        }

        Puller {
            span: self.span.unwrap_or_else(Span::current),
            helm,
            github,
            http,
            git,
            credentials: self.credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{FakeDownloader, FakeGitClient, tar_gz};
    use tempfile::TempDir;

    fn archive_puller() -> (Puller, Arc<FakeDownloader>) {
        let downloader = Arc::new(FakeDownloader::new().serve(
            "https://example.com/tool.tar.gz",
            tar_gz(&[("tool/bin/run", "#!/bin/sh\n")]),
        ));
        let puller = Puller::builder().downloader(downloader.clone()).build();
        (puller, downloader)
    }

    #[tokio::test]
    async fn test_dispatches_to_strategy() {
        let temp = TempDir::new().unwrap();
        let (puller, downloader) = archive_puller();
        let artifact = Artifact::new("tool", temp.path())
            .with_url("https://example.com/tool.tar.gz")
            .with_version("1.0.0");

        let result = puller
            .pull(&CancellationToken::new(), PullMethod::HttpArchive, &artifact)
            .await
            .unwrap();
        assert_eq!(result.directory, temp.path().join("tool"));
        assert_eq!(result.version, "1.0.0");
        assert_eq!(downloader.requested().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_destination_is_rejected_before_fetch() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("tool")).unwrap();
        let (puller, downloader) = archive_puller();
        let artifact = Artifact::new("tool", temp.path()).with_url("https://example.com/tool.tar.gz");

        let err = puller
            .pull(&CancellationToken::new(), PullMethod::HttpArchive, &artifact)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("artifact directory already exists"));
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(downloader.requested().is_empty());
    }

    #[tokio::test]
    async fn test_pull_options_do_not_leak() {
        let temp = TempDir::new().unwrap();
        let puller = Puller::default();
        let client: Arc<dyn GitClient> = Arc::new(FakeGitClient::new(&[("README.md", "hi")]));

        let first = Artifact::new("repo", temp.path()).with_url("https://example.com/repo.git");
        puller
            .pull_with(
                &CancellationToken::new(),
                PullMethod::Git,
                &first,
                &[PullOption::GitClient(client)],
            )
            .await
            .unwrap();
        assert!(temp.path().join("repo/README.md").is_file());

        let second = Artifact::new("again", temp.path()).with_url("https://example.com/repo.git");
        let err = puller
            .pull(&CancellationToken::new(), PullMethod::Git, &second)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_missing_collaborators() {
        let temp = TempDir::new().unwrap();
        let puller = Puller::default();
        for method in [PullMethod::HttpArchive, PullMethod::GithubRelease, PullMethod::Git] {
            let artifact = Artifact::new("a", temp.path())
                .with_url("https://example.com/a.zip")
                .with_repository("acme/a");
            let err = puller
                .pull(&CancellationToken::new(), method, &artifact)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{}", method);
        }
    }

    #[test]
    fn test_scoped_credentials_follow_source() {
        let mut credentials = ScopedCredentials::default();
        credentials.add("https://git.example.com", ResolvedCredentials::Bearer {
            token: "t".to_string(),
        });
        let puller = Puller::builder().scoped_credentials(credentials).build();

        let internal = Artifact::new("a", "/tmp").with_url("https://git.example.com/team/a.git");
        assert!(matches!(
            puller.scoped_options(PullMethod::Git, &internal),
            Some(PullOption::GitAuth(_))
        ));
        let public = Artifact::new("a", "/tmp").with_url("https://github.com/team/a.git");
        assert!(puller.scoped_options(PullMethod::Git, &public).is_none());
        assert!(puller.scoped_options(PullMethod::HttpArchive, &internal).is_none());
    }

    #[test]
    fn test_from_config() {
        let puller = Puller::from_config(&SolasConfig::default()).unwrap();
        assert_eq!(puller.strategy(PullMethod::Git).method(), "git");
        assert_eq!(puller.strategy(PullMethod::HelmChart).method(), "helm-chart");
    }
}
