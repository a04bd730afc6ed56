//! Git collaborator interface and its libgit2 implementation

use async_trait::async_trait;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{AutotagOption, Cred, FetchOptions, RemoteCallbacks, Repository};
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::credentials::ResolvedCredentials;
use crate::error::{PullError, Result};

/// What to check out after cloning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceName {
    /// A branch name, cloned as the checked-out branch
    Branch(String),
    /// A tag name, checked out detached
    Tag(String),
    /// Anything `git rev-parse` understands: branch, tag or commit
    Revision(String),
}

/// Clone request
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    pub url: String,
    pub reference: Option<ReferenceName>,
    /// Fetch only the requested branch
    pub single_branch: bool,
    /// History depth, `0` for full history
    pub depth: u32,
    pub auth: Option<ResolvedCredentials>,
}

impl CloneOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn reference(mut self, reference: ReferenceName) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn single_branch(mut self, single_branch: bool) -> Self {
        self.single_branch = single_branch;
        self
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn auth(mut self, auth: Option<ResolvedCredentials>) -> Self {
        self.auth = auth;
        self
    }
}

/// A freshly cloned working tree
pub trait ClonedRepository: Send {
    /// Check out `commit` detached, discarding local changes when `force`
    fn checkout(&self, commit: &str, force: bool) -> Result<()>;

    /// Hash of the commit at HEAD
    fn head_commit(&self) -> Result<String>;
}

/// Clones repositories
#[async_trait]
pub trait GitClient: Send + Sync {
    async fn clone_repo(
        &self,
        cancel: &CancellationToken,
        directory: &Path,
        options: &CloneOptions,
    ) -> Result<Box<dyn ClonedRepository>>;
}

/// libgit2-backed [`GitClient`]
#[derive(Debug, Clone, Default)]
pub struct Git2Client;

impl Git2Client {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GitClient for Git2Client {
    async fn clone_repo(
        &self,
        cancel: &CancellationToken,
        directory: &Path,
        options: &CloneOptions,
    ) -> Result<Box<dyn ClonedRepository>> {
        let cancel = cancel.clone();
        let directory = directory.to_path_buf();
        let options = options.clone();

        let repo = tokio::task::spawn_blocking(move || clone_blocking(&cancel, &directory, &options))
            .await
            .map_err(|e| PullError::Git {
                message: format!("clone task failed: {}", e),
            })??;

        Ok(Box::new(Git2Repository { repo }))
    }
}

fn clone_blocking(
    cancel: &CancellationToken,
    directory: &Path,
    options: &CloneOptions,
) -> Result<Repository> {
    tracing::debug!("Cloning {} into {}", options.url, directory.display());

    let mut callbacks = RemoteCallbacks::new();
    let token = cancel.clone();
    // Returning false aborts the transfer
    callbacks.transfer_progress(move |_| !token.is_cancelled());
    if let Some(auth) = &options.auth {
        let (username, password) = auth.userpass();
        let (username, password) = (username.to_string(), password.to_string());
        callbacks.credentials(move |_url, _username_from_url, _allowed| {
            Cred::userpass_plaintext(&username, &password)
        });
    }

    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);
    if options.depth > 0 {
        fetch.depth(options.depth as i32);
    }
    if matches!(options.reference, Some(ReferenceName::Tag(_))) {
        fetch.download_tags(AutotagOption::All);
    }

    let mut builder = RepoBuilder::new();
    if let Some(ReferenceName::Branch(branch)) = &options.reference {
        builder.branch(branch);
        if options.single_branch {
            let refspec = format!("+refs/heads/{0}:refs/remotes/origin/{0}", branch);
            builder.remote_create(move |repo, name, url| repo.remote_with_fetch(name, url, &refspec));
        }
    }
    builder.fetch_options(fetch);

    let repo = builder.clone(&options.url, directory).map_err(|e| {
        if cancel.is_cancelled() {
            PullError::Cancelled
        } else {
            PullError::from(e)
        }
    })?;

    match &options.reference {
        Some(ReferenceName::Tag(tag)) => {
            checkout_detached(&repo, &format!("refs/tags/{}", tag), true)?;
        }
        Some(ReferenceName::Revision(revision)) => {
            let spec = resolve_revision(&repo, revision)?;
            checkout_detached(&repo, &spec, true)?;
        }
        Some(ReferenceName::Branch(_)) | None => {}
    }

    Ok(repo)
}

/// Find the first rev-parse spelling of `revision` that exists
fn resolve_revision(repo: &Repository, revision: &str) -> Result<String> {
    let candidates = [
        format!("refs/remotes/origin/{}", revision),
        format!("refs/tags/{}", revision),
        revision.to_string(),
    ];
    candidates
        .into_iter()
        .find(|spec| repo.revparse_single(spec).is_ok())
        .ok_or_else(|| PullError::Git {
            message: format!("revision {} not found", revision),
        })
}

fn checkout_detached(repo: &Repository, spec: &str, force: bool) -> Result<()> {
    let commit = repo.revparse_single(spec)?.peel_to_commit()?;
    let mut checkout = CheckoutBuilder::new();
    if force {
        checkout.force();
    }
    repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
    repo.set_head_detached(commit.id())?;
    Ok(())
}

struct Git2Repository {
    repo: Repository,
}

impl ClonedRepository for Git2Repository {
    fn checkout(&self, commit: &str, force: bool) -> Result<()> {
        checkout_detached(&self.repo, commit, force)
    }

    fn head_commit(&self) -> Result<String> {
        Ok(self.repo.head()?.peel_to_commit()?.id().to_string())
    }
}
