//! Installing a dependency tree into the vendor directory

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

#[cfg(not(unix))]
use solas_core::copy_tree;
use solas_core::{Staging, is_local, promote, safe_path};

use crate::credentials::ResolvedCredentials;
use crate::error::{PullError, Result, ResultExt};
use crate::git::{CloneOptions, GitClient, ReferenceName};
use crate::jsonnet::file::{Dependency, GitSource, JSONNET_FILE, JsonnetFile, Source};
use crate::strategy::discard_staging;

/// Vendors dependencies for one jsonnet project
pub(crate) struct Installer<'a> {
    pub client: &'a dyn GitClient,
    pub auth: Option<ResolvedCredentials>,
    /// Project root holding `jsonnetfile.json`
    pub base_dir: &'a Path,
    /// Vendor directory relative to `base_dir`
    pub jsonnet_home: &'a str,
    pub legacy_imports: bool,
}

impl Installer<'_> {
    fn vendor_dir(&self) -> PathBuf {
        self.base_dir.join(self.jsonnet_home)
    }

    /// Location of `name` under the vendor directory
    ///
    /// Vendored entries may be symlinks, so the path is checked lexically
    /// rather than resolved.
    fn vendor_path(&self, name: &str) -> Result<PathBuf> {
        if !is_local(name) {
            return Err(PullError::InvalidDependency {
                spec: name.to_string(),
                reason: "vendor name must be a local path".to_string(),
            });
        }
        Ok(self.vendor_dir().join(name))
    }

    /// Scratch space for clones, removed by the caller
    pub fn tmp_dir(&self) -> PathBuf {
        self.vendor_dir().join(".tmp")
    }

    /// Vendor `direct` and everything it depends on, returning the locked set
    ///
    /// Entries of `locks` whose vendored tree is intact are kept without
    /// fetching. The first occurrence of a name wins.
    pub async fn ensure(
        &self,
        cancel: &CancellationToken,
        direct: &[Dependency],
        locks: &JsonnetFile,
    ) -> Result<Vec<Dependency>> {
        let mut queue: VecDeque<Dependency> = direct.iter().cloned().collect();
        let mut seen = HashSet::new();
        let mut locked = Vec::new();

        while let Some(dep) = queue.pop_front() {
            let name = dep.name();
            if !seen.insert(name.clone()) {
                continue;
            }

            let entry = match locks.get(&name) {
                Some(lock) if lock.source == dep.source && self.is_intact(lock)? => {
                    tracing::debug!("{} is up to date at {}", name, lock.version);
                    lock.clone()
                }
                _ => self.install(cancel, &dep).await?,
            };

            if self.legacy_imports {
                self.link_legacy_name(&entry)?;
            }

            let installed = self.vendor_path(&name)?;
            let nested = JsonnetFile::load_optional(&installed.join(JSONNET_FILE))?;
            for child in nested.dependencies {
                queue.push_back(self.rebase_local(&name, child));
            }
            locked.push(entry);
        }

        Ok(locked)
    }

    fn is_intact(&self, lock: &Dependency) -> Result<bool> {
        let installed = self.vendor_path(&lock.name())?;
        match &lock.source {
            Source::Local(_) => Ok(installed.symlink_metadata().is_ok()),
            Source::Git(_) => {
                if lock.sum.is_empty() || !installed.is_dir() {
                    return Ok(false);
                }
                Ok(tree_sum(&installed)? == lock.sum)
            }
        }
    }

    async fn install(&self, cancel: &CancellationToken, dep: &Dependency) -> Result<Dependency> {
        match &dep.source {
            Source::Git(git) => self.install_git(cancel, dep, git).await,
            Source::Local(local) => {
                self.install_local(dep, &local.directory)?;
                Ok(dep.clone())
            }
        }
    }

    async fn install_git(
        &self,
        cancel: &CancellationToken,
        dep: &Dependency,
        git: &GitSource,
    ) -> Result<Dependency> {
        let name = dep.name();
        tracing::debug!("Installing {}@{} from {}", name, dep.version, git.remote);

        let staging = Staging::in_dir(&self.tmp_dir(), "jsonnet-")?;
        let checkout = staging.path().join("repository");
        let options = CloneOptions::new(&git.remote)
            .reference(ReferenceName::Revision(dep.version.clone()))
            .auth(self.auth.clone());

        let repo = self
            .client
            .clone_repo(cancel, &checkout, &options)
            .await
            .context(format!("cloning {}", git.remote))?;
        let commit = repo.head_commit()?;
        drop(repo);

        let git_dir = checkout.join(".git");
        if git_dir.exists() {
            fs::remove_dir_all(&git_dir)?;
        }

        let root = if git.subdir.is_empty() {
            checkout
        } else {
            let root = safe_path(&checkout, &git.subdir)?;
            if !root.is_dir() {
                return Err(PullError::SubdirNotFound {
                    sub_dir: git.subdir.clone(),
                });
            }
            root
        };

        let destination = self.vendor_path(&name)?;
        remove_existing(&destination)?;
        promote(&root, &destination).context("renaming directory")?;
        discard_staging(staging);

        Ok(Dependency {
            version: commit,
            sum: tree_sum(&destination)?,
            ..dep.clone()
        })
    }

    fn install_local(&self, dep: &Dependency, directory: &str) -> Result<()> {
        let source = self.base_dir.join(directory);
        if !source.is_dir() {
            return Err(PullError::InvalidDependency {
                spec: directory.to_string(),
                reason: "local directory does not exist".to_string(),
            });
        }
        let destination = self.vendor_path(&dep.name())?;
        remove_existing(&destination)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(fs::canonicalize(&source)?, &destination)?;
        #[cfg(not(unix))]
        copy_tree(&source, &destination)?;
        Ok(())
    }

    /// Point `vendor/<short name>` at the vendored tree
    fn link_legacy_name(&self, dep: &Dependency) -> Result<()> {
        let name = dep.name();
        let legacy = dep.legacy_name();
        if legacy == name {
            return Ok(());
        }
        let link = self.vendor_path(&legacy)?;

        match link.symlink_metadata() {
            Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(&link)?,
            Ok(_) => {
                tracing::warn!(
                    "Not linking {} to {}: a directory with that name exists",
                    legacy,
                    name
                );
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(&name, &link)?;
        #[cfg(not(unix))]
        copy_tree(&self.vendor_dir().join(&name), &link)?;
        Ok(())
    }

    /// Local paths in a nested `jsonnetfile.json` are relative to that dependency
    fn rebase_local(&self, parent: &str, mut dep: Dependency) -> Dependency {
        if let Source::Local(local) = &mut dep.source {
            local.directory = Path::new(self.jsonnet_home)
                .join(parent)
                .join(&local.directory)
                .to_string_lossy()
                .into_owned();
        }
        dep
    }
}

fn remove_existing(path: &Path) -> Result<()> {
    match path.symlink_metadata() {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// base64(sha256) over every file of a tree, in path order
pub fn tree_sum(root: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?;
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update(fs::read(entry.path())?);
    }
    Ok(STANDARD.encode(hasher.finalize()))
}
