//! Git repository pulls
//!
//! The ref to clone is picked from the artifact in priority order: commit hash,
//! tag, branch, then `main`. The `.git` directory is dropped before install and
//! `sub_dir` may narrow the installed tree.

mod client;

pub use client::{CloneOptions, ClonedRepository, Git2Client, GitClient, ReferenceName};

#[cfg(test)]
pub(crate) use client::tests as fixtures;

use async_trait::async_trait;
use std::fs;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use solas_core::{Artifact, LATEST, PullResult, Staging, first_non_empty, is_local, promote, safe_path};

use crate::credentials::ResolvedCredentials;
use crate::error::{PullError, Result, ResultExt};
use crate::strategy::{PullOption, Strategy, blocking, discard_staging, ensure_not_cancelled};

/// Branch cloned when the artifact names no ref
pub const DEFAULT_BRANCH: &str = "main";

const METHOD: &str = "git";

/// Clone-and-install strategy
#[derive(Clone, Default)]
pub struct GitStrategy {
    client: Option<Arc<dyn GitClient>>,
    auth: Option<ResolvedCredentials>,
}

impl GitStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: Arc<dyn GitClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_auth(mut self, auth: Option<ResolvedCredentials>) -> Self {
        self.auth = auth;
        self
    }

    /// Clone request for `artifact`
    pub fn clone_options(&self, artifact: &Artifact) -> CloneOptions {
        let options = CloneOptions::new(&artifact.url).auth(self.auth.clone());
        let main = || ReferenceName::Branch(DEFAULT_BRANCH.to_string());

        if !artifact.commit_hash.is_empty() {
            options.reference(main()).single_branch(true).depth(1)
        } else if !artifact.tag.is_empty() {
            options.reference(ReferenceName::Tag(artifact.tag.clone()))
        } else if !artifact.branch.is_empty() {
            options.reference(ReferenceName::Branch(artifact.branch.clone()))
        } else {
            options.reference(main()).single_branch(true).depth(1)
        }
    }
}

#[async_trait]
impl Strategy for GitStrategy {
    fn method(&self) -> &'static str {
        METHOD
    }

    fn apply(&mut self, option: &PullOption) {
        match option {
            PullOption::GitClient(client) => self.client = Some(Arc::clone(client)),
            PullOption::GitAuth(auth) => self.auth = Some(auth.clone()),
            _ => {}
        }
    }

    async fn pull(&self, cancel: &CancellationToken, artifact: &Artifact) -> Result<PullResult> {
        let client = self.client.as_ref().ok_or(PullError::MissingCollaborator {
            collaborator: "git client",
            method: METHOD,
        })?;
        if !artifact.sub_dir.is_empty() && !is_local(&artifact.sub_dir) {
            return Err(PullError::SubdirNotLocal {
                sub_dir: artifact.sub_dir.clone(),
            });
        }
        ensure_not_cancelled(cancel)?;

        let staging = Staging::new()?;
        let clone_dir = staging.path().join("repository");
        let options = self.clone_options(artifact);

        let repo = client
            .clone_repo(cancel, &clone_dir, &options)
            .await
            .context("cloning repository")?;

        if !artifact.commit_hash.is_empty() {
            let commit = artifact.commit_hash.clone();
            blocking(move || {
                repo.checkout(&commit, true)
                    .map_err(|e| PullError::CheckoutFailed {
                        commit: commit.clone(),
                        message: e.to_string(),
                    })
            })
            .await?;
        } else {
            drop(repo);
        }

        let git_dir = clone_dir.join(".git");
        if git_dir.symlink_metadata().is_ok() {
            fs::remove_dir_all(&git_dir).context("removing .git directory")?;
        }

        let source = if artifact.sub_dir.is_empty() {
            clone_dir
        } else {
            let resolved = safe_path(&clone_dir, &artifact.sub_dir)?;
            if !resolved.is_dir() {
                return Err(PullError::SubdirNotFound {
                    sub_dir: artifact.sub_dir.clone(),
                });
            }
            resolved
        };

        let destination = self.compute_destination(artifact, None);
        promote(&source, &destination).context("renaming directory")?;
        discard_staging(staging);

        // A cloned tag is the best version hint short of an explicit one
        let version = first_non_empty(&[artifact.version.as_str(), artifact.tag.as_str(), LATEST]);
        tracing::debug!("Installed {} at {}", artifact.url, destination.display());
        Ok(PullResult::new(destination, version))
    }
}
