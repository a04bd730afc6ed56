//! Artifact descriptor and pull result
//!
//! An [`Artifact`] describes the intent to obtain one named artifact. Every pull
//! strategy reads the same descriptor and interprets the fields it cares about.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Version reported when neither the caller nor the source supplied one
pub const LATEST: &str = "latest";

/// Description of a single artifact to pull
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Artifact {
    /// Logical identifier, used as the final directory name
    pub name: String,

    /// Source locator (Helm repository URL, OCI base, GitHub `owner/repo`)
    pub repository: String,

    /// Direct source URL (HTTP archive, Git remote, jsonnet dependency)
    pub url: String,

    /// Git branch
    pub branch: String,

    /// Git tag
    pub tag: String,

    /// Git commit hash, takes priority over tag and branch
    pub commit_hash: String,

    /// Desired version
    pub version: String,

    /// Base name of the GitHub release asset, without extension
    pub asset_name: String,

    /// Subdirectory of the source tree to use as the artifact root
    pub sub_dir: String,

    /// Parent directory of the final artifact directory
    pub base_dir: PathBuf,
}

impl Artifact {
    /// Create a descriptor for `name` installed under `base_dir`
    pub fn new(name: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_commit_hash(mut self, commit_hash: impl Into<String>) -> Self {
        self.commit_hash = commit_hash.into();
        self
    }

    pub fn with_asset_name(mut self, asset_name: impl Into<String>) -> Self {
        self.asset_name = asset_name.into();
        self
    }

    pub fn with_sub_dir(mut self, sub_dir: impl Into<String>) -> Self {
        self.sub_dir = sub_dir.into();
        self
    }

    /// Canonical install target: `base_dir / name`
    pub fn destination_directory(&self) -> PathBuf {
        self.base_dir.join(&self.name)
    }

    /// The caller's version, or [`LATEST`] when empty
    pub fn version_or_latest(&self) -> &str {
        first_non_empty(&[&self.version, LATEST])
    }
}

/// Outcome of a successful pull
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResult {
    /// Finalized install directory
    pub directory: PathBuf,

    /// Resolved version of the artifact
    pub version: String,
}

impl PullResult {
    pub fn new(directory: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            version: version.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Return the first non-empty candidate, or `""` when all are empty
pub fn first_non_empty<'a>(candidates: &[&'a str]) -> &'a str {
    candidates
        .iter()
        .copied()
        .find(|c| !c.is_empty())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_directory() {
        let artifact = Artifact::new("my-component", "/tmp/base");
        assert_eq!(
            artifact.destination_directory(),
            PathBuf::from("/tmp/base/my-component")
        );
    }

    #[test]
    fn test_version_or_latest() {
        let artifact = Artifact::new("a", "/tmp");
        assert_eq!(artifact.version_or_latest(), "latest");

        let artifact = artifact.with_version("1.2.3");
        assert_eq!(artifact.version_or_latest(), "1.2.3");
    }

    #[test]
    fn test_first_non_empty() {
        assert_eq!(first_non_empty(&["", "b", "c"]), "b");
        assert_eq!(first_non_empty(&["a", "b"]), "a");
        assert_eq!(first_non_empty(&["", ""]), "");
        assert_eq!(first_non_empty(&[]), "");
    }

    #[test]
    fn test_artifact_yaml() {
        let yaml = r#"
name: nginx
repository: oci://ghcr.io/org/charts
version: 1.0.0
commitHash: abc123
subDir: charts/nginx
baseDir: /opt/artifacts
"#;
        let artifact: Artifact = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(artifact.name, "nginx");
        assert_eq!(artifact.commit_hash, "abc123");
        assert_eq!(artifact.sub_dir, "charts/nginx");
        assert!(artifact.url.is_empty());
        assert_eq!(
            artifact.destination_directory(),
            PathBuf::from("/opt/artifacts/nginx")
        );
    }
}
