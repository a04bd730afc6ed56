//! Jsonnet-bundler installs
//!
//! A pull adds (or updates) one dependency in the project's `jsonnetfile.json`,
//! vendors the whole dependency tree and refreshes `jsonnetfile.lock.json`.
//! Files are rewritten only when their content changes.

mod ensure;
mod file;
mod parse;

pub use ensure::tree_sum;
pub use file::{Dependency, GitSource, JSONNET_FILE, JsonnetFile, LOCK_FILE, LocalSource, Source};
pub use parse::{DEFAULT_GIT_VERSION, parse_dependency};

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use solas_core::{Artifact, LATEST, PullResult, first_non_empty};

use crate::credentials::ResolvedCredentials;
use crate::error::{PullError, Result};
use crate::strategy::{PullOption, Strategy, ensure_not_cancelled};
use ensure::Installer;

/// Default vendor directory, relative to the project root
pub const DEFAULT_JSONNET_HOME: &str = "vendor";

const METHOD: &str = "jsonnet-bundler";

/// Vendors jsonnet dependencies into an existing project
///
/// Unlike the other strategies this one installs into a shared tree, so it is
/// called directly instead of through [`Puller`](crate::Puller).
#[derive(Clone)]
pub struct JsonnetBundler {
    client: Option<Arc<dyn crate::git::GitClient>>,
    auth: Option<ResolvedCredentials>,
    jsonnet_home: String,
}

impl Default for JsonnetBundler {
    fn default() -> Self {
        Self {
            client: None,
            auth: None,
            jsonnet_home: DEFAULT_JSONNET_HOME.to_string(),
        }
    }
}

impl JsonnetBundler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: Arc<dyn crate::git::GitClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_auth(mut self, auth: Option<ResolvedCredentials>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_jsonnet_home(mut self, jsonnet_home: impl Into<String>) -> Self {
        self.jsonnet_home = jsonnet_home.into();
        self
    }

    pub fn jsonnet_home(&self) -> &str {
        &self.jsonnet_home
    }
}

#[async_trait]
impl Strategy for JsonnetBundler {
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
        let client = self.client.as_deref().ok_or(PullError::MissingCollaborator {
            collaborator: "git client",
            method: METHOD,
        })?;
        ensure_not_cancelled(cancel)?;

        let base_dir = artifact.base_dir.as_path();
        let spec_path = base_dir.join(JSONNET_FILE);
        let lock_path = base_dir.join(LOCK_FILE);
        let spec = JsonnetFile::load(&spec_path)?;
        let mut locks = JsonnetFile::load_optional(&lock_path)?;

        let requested = parse_dependency(base_dir, &artifact.url)?;
        let name = requested.name();

        let mut updated = spec.clone();
        match updated.position(&name) {
            Some(i) if updated.dependencies[i].same_request(&requested) => {}
            Some(i) => {
                updated.dependencies[i] = requested.clone();
                locks.dependencies.retain(|d| d.name() != name);
            }
            None => {
                updated.dependencies.push(requested.clone());
                locks.dependencies.retain(|d| d.name() != name);
            }
        }

        let installer = Installer {
            client,
            auth: self.auth.clone(),
            base_dir,
            jsonnet_home: &self.jsonnet_home,
            legacy_imports: updated.legacy_imports,
        };
        let tmp_dir = installer.tmp_dir();
        std::fs::create_dir_all(&tmp_dir)?;
        let ensured = installer.ensure(cancel, &updated.dependencies, &locks).await;
        if let Err(e) = std::fs::remove_dir_all(&tmp_dir) {
            tracing::warn!("Failed to remove {}: {}", tmp_dir.display(), e);
        }

        let locked = JsonnetFile {
            version: updated.version,
            dependencies: ensured?,
            legacy_imports: updated.legacy_imports,
        }
        .sorted();

        if updated != spec {
            tracing::debug!("Updating {}", spec_path.display());
            updated.write(&spec_path)?;
        }
        if locked != locks.sorted() {
            tracing::debug!("Updating {}", lock_path.display());
            locked.write(&lock_path)?;
        }

        let version = first_non_empty(&[requested.version.as_str(), LATEST]);
        Ok(PullResult::new(self.compute_destination(artifact, None), version))
    }
}
