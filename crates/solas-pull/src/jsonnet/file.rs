//! `jsonnetfile.json` and `jsonnetfile.lock.json`

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PullError, Result};

/// Name of the dependency spec file
pub const JSONNET_FILE: &str = "jsonnetfile.json";

/// Name of the lock file
pub const LOCK_FILE: &str = "jsonnetfile.lock.json";

/// Mode of rewritten spec and lock files
#[cfg(unix)]
const FILE_MODE: u32 = 0o640;

/// A spec or lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonnetFile {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Link every dependency under its short name as well
    #[serde(default = "default_legacy_imports")]
    pub legacy_imports: bool,
}

fn default_version() -> u32 {
    1
}

fn default_legacy_imports() -> bool {
    true
}

impl Default for JsonnetFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            dependencies: Vec::new(),
            legacy_imports: default_legacy_imports(),
        }
    }
}

/// One dependency entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub source: Source,

    #[serde(default)]
    pub version: String,

    /// Checksum of the vendored tree, lock file only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sum: String,

    /// Explicit vendor name overriding the one derived from the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Where a dependency comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Git(GitSource),
    Local(LocalSource),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSource {
    pub remote: String,

    #[serde(default)]
    pub subdir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSource {
    pub directory: String,
}

impl GitSource {
    /// `host/path` of the remote without scheme, user or `.git`
    pub fn repository_path(&self) -> String {
        let remote = self.remote.as_str();
        let without_scheme = remote
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(remote);
        let without_user = without_scheme
            .split_once('@')
            .map(|(_, rest)| rest)
            .unwrap_or(without_scheme);
        // scp form: git@host:user/repo.git
        let path = without_user.replacen(':', "/", 1);
        path.trim_end_matches('/')
            .trim_end_matches(".git")
            .to_string()
    }
}

impl Dependency {
    pub fn git(remote: impl Into<String>, subdir: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            source: Source::Git(GitSource {
                remote: remote.into(),
                subdir: subdir.into(),
            }),
            version: version.into(),
            sum: String::new(),
            name: None,
        }
    }

    pub fn local(directory: impl Into<String>) -> Self {
        Self {
            source: Source::Local(LocalSource {
                directory: directory.into(),
            }),
            version: String::new(),
            sum: String::new(),
            name: None,
        }
    }

    /// Path of the dependency under the vendor directory
    pub fn name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.source {
            Source::Git(git) => {
                let subdir = git.subdir.trim_matches('/');
                if subdir.is_empty() {
                    git.repository_path()
                } else {
                    format!("{}/{}", git.repository_path(), subdir)
                }
            }
            Source::Local(local) => last_component(&local.directory).to_string(),
        }
    }

    /// Short name used for legacy import links
    pub fn legacy_name(&self) -> String {
        last_component(&self.name()).to_string()
    }

    /// Same dependency, ignoring checksum
    pub fn same_request(&self, other: &Dependency) -> bool {
        self.source == other.source && self.version == other.version && self.name == other.name
    }
}

fn last_component(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

impl JsonnetFile {
    /// Load a required file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PullError::JsonnetFileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Load a file that may be absent, defaulting to an empty one
    pub fn load_optional(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Index of the dependency vendored under `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.dependencies.iter().position(|d| d.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.name() == name)
    }

    /// Copy with dependencies ordered by name
    pub fn sorted(&self) -> Self {
        let mut sorted = self.clone();
        sorted.dependencies.sort_by_key(|d| d.name());
        sorted
    }

    /// Write as indented JSON with a trailing newline
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(FILE_MODE))?;
        }
        Ok(())
    }
}
