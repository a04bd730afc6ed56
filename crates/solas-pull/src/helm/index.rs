//! Helm repository index (`index.yaml`)

use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use url::Url;

use crate::error::{PullError, Result};

/// Repository index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartIndex {
    #[serde(default)]
    pub api_version: String,

    /// Chart versions by chart name
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartEntry>>,
}

/// One chart version in the index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub name: String,

    pub version: String,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Archive locations, absolute or relative to the repository
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA256 digest of the archive
    #[serde(default)]
    pub digest: Option<String>,

    #[serde(default)]
    pub deprecated: bool,
}

impl ChartIndex {
    /// Parse index from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(bytes)
            .map_err(|e| PullError::Serialization(format!("invalid chart index: {}", e)))
    }

    /// Get the latest version of a chart
    ///
    /// The highest stable release wins; prereleases are only picked when the
    /// chart has no stable release at all.
    pub fn get_latest(&self, name: &str) -> Option<&ChartEntry> {
        let entries = self.entries.get(name)?;
        let highest = |stable_only: bool| {
            entries
                .iter()
                .filter(|e| !stable_only || is_stable(&e.version))
                .max_by(|a, b| compare_versions(&a.version, &b.version))
        };
        highest(true).or_else(|| highest(false))
    }

    /// Get a specific version of a chart
    pub fn get_version(&self, name: &str, version: &str) -> Option<&ChartEntry> {
        let wanted = version.trim_start_matches('v');
        self.entries
            .get(name)?
            .iter()
            .find(|e| e.version == version || e.version.trim_start_matches('v') == wanted)
    }
}

impl ChartEntry {
    /// Absolute download URL, resolving relative entries against `repository`
    pub fn download_url(&self, repository: &str) -> Result<String> {
        let url = self.urls.first().ok_or_else(|| PullError::ChartNotFound {
            name: format!("{}-{} (no download URL)", self.name, self.version),
            repository: repository.to_string(),
        })?;
        if Url::parse(url).is_ok() {
            return Ok(url.clone());
        }
        let base = Url::parse(&format!("{}/", repository.trim_end_matches('/')))?;
        Ok(base.join(url)?.to_string())
    }
}

/// Order version strings by semver, placing unparseable ones below parseable ones
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Whether `version` parses as semver without a prerelease part
pub fn is_stable(version: &str) -> bool {
    parse_version(version).is_some_and(|v| v.pre.is_empty())
}

/// Parse a chart version, accepting a `v` prefix and OCI's `_` for `+`
pub fn parse_version(version: &str) -> Option<Version> {
    Version::parse(&version.trim_start_matches('v').replace('_', "+")).ok()
}
