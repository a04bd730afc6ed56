//! Staging directories and promotion
//!
//! Every pull works inside a [`Staging`] directory under the system temp root and
//! finishes by [`promote`]-ing one subdirectory of it to the install location.
//! Dropping a `Staging` removes it, so every exit path cleans up.

use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

/// Prefix of staging directories under the system temp root
pub const DEFAULT_PREFIX: &str = "solas-";

/// A scoped temporary directory owned by a single pull
#[derive(Debug)]
pub struct Staging {
    dir: TempDir,
}

impl Staging {
    /// Create a staging directory with the default prefix
    pub fn new() -> Result<Self> {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    /// Create a staging directory in the system temp root
    pub fn with_prefix(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        tracing::debug!("Created staging directory {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Create a staging directory inside `parent`
    pub fn in_dir(parent: &Path, prefix: &str) -> Result<Self> {
        fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory, reporting a failure instead of ignoring it
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|source| CoreError::StagingCleanup { path, source })
    }
}

/// Atomically move `source` to `destination`
///
/// Refuses to replace an existing destination. When the two paths live on
/// different filesystems the tree is copied into a hidden sibling of
/// `destination` first and renamed from there, so the install is still a single
/// rename.
pub fn promote(source: &Path, destination: &Path) -> Result<()> {
    if destination.symlink_metadata().is_ok() {
        return Err(CoreError::DestinationExists {
            path: destination.to_path_buf(),
        });
    }

    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    match fs::rename(source, destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                "{} and {} are on different filesystems, copying",
                source.display(),
                destination.display()
            );
            let sibling = tempfile::Builder::new()
                .prefix(".solas-promote-")
                .tempdir_in(parent)?;
            let staged = sibling.path().join("tree");
            copy_tree(source, &staged)?;
            fs::rename(&staged, destination)?;
        }
        Err(e) => return Err(e.into()),
    }

    tracing::debug!(
        "Promoted {} to {}",
        source.display(),
        destination.display()
    );
    Ok(())
}

/// Recursively copy a directory tree, recreating symlinks on Unix
pub fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = destination.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            #[cfg(unix)]
            std::os::unix::fs::symlink(fs::read_link(entry.path())?, &target)?;
            #[cfg(not(unix))]
            tracing::warn!("Skipping symlink {}", entry.path().display());
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
