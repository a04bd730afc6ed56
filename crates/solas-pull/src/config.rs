//! Puller configuration
//!
//! Stored in `~/.config/solas/config.yaml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use solas_core::MAX_FILE_SIZE;

use crate::credentials::{Credentials, ScopedCredentials, github_token_from_env};
use crate::error::{PullError, Result};
use crate::jsonnet::DEFAULT_JSONNET_HOME;

/// Default GitHub REST API base
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolasConfig {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub jsonnet: JsonnetConfig,

    /// Base directory used when a pull names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Per-file cap on decompressed bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Credentials scoped to URL prefixes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<CredentialScope>,
}

fn default_max_file_size() -> u64 {
    MAX_FILE_SIZE
}

impl Default for SolasConfig {
    fn default() -> Self {
        Self {
            github: GitHubConfig::default(),
            jsonnet: JsonnetConfig::default(),
            base_dir: None,
            max_file_size: default_max_file_size(),
            credentials: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Falls back to `GITHUB_TOKEN` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_github_api_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            token: None,
        }
    }
}

impl GitHubConfig {
    /// Configured token, else the environment token
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(github_token_from_env)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonnetConfig {
    #[serde(default = "default_jsonnet_home")]
    pub home: String,
}

fn default_jsonnet_home() -> String {
    DEFAULT_JSONNET_HOME.to_string()
}

impl Default for JsonnetConfig {
    fn default() -> Self {
        Self {
            home: default_jsonnet_home(),
        }
    }
}

/// Credentials applied to every URL starting with `urlPrefix`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialScope {
    pub url_prefix: String,

    #[serde(flatten)]
    pub credentials: Credentials,
}

impl SolasConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;

        // Credentials may be inline, keep the file private
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut options = std::fs::OpenOptions::new();
            options.write(true).create(true).truncate(true).mode(0o600);
            std::io::Write::write_all(&mut options.open(path)?, content.as_bytes())?;
        }

        #[cfg(not(unix))]
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| PullError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("solas").join("config.yaml"))
    }

    /// Resolve every credential scope
    pub fn scoped_credentials(&self) -> Result<ScopedCredentials> {
        let mut scoped = ScopedCredentials::default();
        for scope in &self.credentials {
            let resolved = scope.credentials.resolve().map_err(|e| PullError::InvalidConfig {
                message: format!("credentials for {}: {}", scope.url_prefix, e),
            })?;
            scoped.add(&scope.url_prefix, resolved);
        }
        Ok(scoped)
    }
}
