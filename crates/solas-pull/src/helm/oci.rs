//! OCI registry access for Helm charts

use async_trait::async_trait;
use oci_distribution::Reference;
use oci_distribution::client::{Client, ClientConfig, ClientProtocol};
use oci_distribution::secrets::RegistryAuth;
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::credentials::ResolvedCredentials;
use crate::error::{PullError, Result};
use crate::helm::index::{compare_versions, is_stable};

/// Scheme prefix marking an OCI chart repository
pub const OCI_SCHEME: &str = "oci://";

/// Layer media types of a Helm chart artifact
pub mod media_types {
    pub const HELM_CONFIG: &str = "application/vnd.cncf.helm.config.v1+json";
    pub const HELM_CONTENT: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";
}

/// Chart registry interface
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Fetch the packaged chart (`.tgz` bytes) at `reference:version`
    async fn pull_chart(
        &self,
        cancel: &CancellationToken,
        reference: &OciReference,
        version: &str,
    ) -> Result<Vec<u8>>;

    /// Tags published for `reference`
    async fn list_tags(
        &self,
        cancel: &CancellationToken,
        reference: &OciReference,
    ) -> Result<Vec<String>>;
}

/// oci-distribution backed [`RegistryClient`]
pub struct OciRegistryClient {
    client: Client,
    auth: RegistryAuth,
}

impl OciRegistryClient {
    pub fn new(credentials: Option<ResolvedCredentials>) -> Self {
        let auth = credentials.map_or(RegistryAuth::Anonymous, |credentials| {
            // Token exchange takes the token as the basic-auth password
            let (username, password) = match &credentials {
                ResolvedCredentials::Basic { .. } => credentials.userpass(),
                ResolvedCredentials::Bearer { token } => ("", token.as_str()),
            };
            RegistryAuth::Basic(username.to_string(), password.to_string())
        });
        let client = Client::new(ClientConfig {
            protocol: ClientProtocol::Https,
            ..ClientConfig::default()
        });
        Self { client, auth }
    }
}

#[async_trait]
impl RegistryClient for OciRegistryClient {
    async fn pull_chart(
        &self,
        cancel: &CancellationToken,
        reference: &OciReference,
        version: &str,
    ) -> Result<Vec<u8>> {
        let reference = reference.tagged(version);
        tracing::debug!("Pulling chart {}", reference);

        let pull = self.client.pull(
            &reference,
            &self.auth,
            vec![media_types::HELM_CONFIG, media_types::HELM_CONTENT],
        );
        let image = tokio::select! {
            _ = cancel.cancelled() => return Err(PullError::Cancelled),
            image = pull => image.map_err(|e| PullError::OciError {
                message: format!("pulling {}: {}", reference, e),
            })?,
        };

        let content = image
            .layers
            .into_iter()
            .find(|layer| layer.media_type == media_types::HELM_CONTENT);
        match content {
            Some(layer) => Ok(layer.data),
            None => Err(PullError::OciError {
                message: format!("{} has no chart content layer", reference),
            }),
        }
    }

    async fn list_tags(
        &self,
        cancel: &CancellationToken,
        reference: &OciReference,
    ) -> Result<Vec<String>> {
        let reference = reference.tagged("latest");
        let list = self.client.list_tags(&reference, &self.auth, None, None);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(PullError::Cancelled),
            response = list => response.map_err(|e| PullError::OciError {
                message: format!("listing tags of {}: {}", reference, e),
            })?,
        };
        Ok(response.tags)
    }
}

/// Highest semver tag, ignoring tags that are not versions
///
/// Stable releases win over prereleases unless only prereleases exist.
pub fn highest_version_tag(tags: &[String]) -> Option<&str> {
    let highest = |stable_only: bool| {
        tags.iter()
            .filter(|t| crate::helm::index::parse_version(t).is_some())
            .filter(|t| !stable_only || is_stable(t))
            .max_by(|a, b| compare_versions(a, b))
    };
    highest(true).or_else(|| highest(false)).map(String::as_str)
}

/// Chart location inside an OCI registry, without tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciReference {
    pub registry: String,
    pub repository: String,
}

impl OciReference {
    /// Reference of chart `name` under the `oci://registry/path` base `repository`
    pub fn for_chart(repository: &str, name: &str) -> Result<Self> {
        let invalid = || PullError::InvalidOciReference {
            reference: format!("{}/{}", repository, name),
        };
        let base = repository
            .strip_prefix(OCI_SCHEME)
            .unwrap_or(repository)
            .trim_end_matches('/');
        let (registry, path) = match base.split_once('/') {
            Some((registry, path)) => (registry, Some(path)),
            None => (base, None),
        };
        if registry.is_empty() || name.is_empty() || name.contains(':') {
            return Err(invalid());
        }

        let repository = match path {
            Some(path) if !path.is_empty() => format!("{}/{}", path, name),
            _ => name.to_string(),
        };
        Ok(Self {
            registry: registry.to_string(),
            repository,
        })
    }

    /// Registry reference of this chart at `tag`
    ///
    /// OCI tags cannot carry `+`; Helm publishes build metadata with `_`.
    pub fn tagged(&self, tag: &str) -> Reference {
        Reference::with_tag(
            self.registry.clone(),
            self.repository.clone(),
            tag.replace('+', "_"),
        )
    }
}

impl fmt::Display for OciReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)
    }
}
