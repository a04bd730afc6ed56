//! GitHub releases API client

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_GITHUB_API_URL;
use crate::download::check_status;
use crate::error::{PullError, Result};

/// A published release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub name: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A file attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

impl ReleaseAsset {
    pub fn new(name: impl Into<String>, browser_download_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            browser_download_url: browser_download_url.into(),
        }
    }
}

/// Looks up releases of a repository
#[async_trait]
pub trait ReleaseClient: Send + Sync {
    async fn get_release_by_tag(
        &self,
        cancel: &CancellationToken,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Release>;

    async fn get_latest_release(
        &self,
        cancel: &CancellationToken,
        owner: &str,
        repo: &str,
    ) -> Result<Release>;
}

/// REST client for the GitHub (or GitHub Enterprise) API
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("solas/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PullError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Client for api.github.com
    pub fn public(token: Option<String>) -> Result<Self> {
        Self::new(DEFAULT_GITHUB_API_URL, token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        not_found: impl FnOnce() -> PullError,
    ) -> Result<T> {
        let url = format!("{}{}", self.api_url, path);
        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(PullError::Cancelled),
            response = request.send() => response?,
        };
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(not_found());
        }
        let response = check_status(response, &url)?;

        tokio::select! {
            _ = cancel.cancelled() => Err(PullError::Cancelled),
            body = response.json::<T>() => Ok(body?),
        }
    }
}

#[async_trait]
impl ReleaseClient for GitHubClient {
    async fn get_release_by_tag(
        &self,
        cancel: &CancellationToken,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Release> {
        let path = format!("/repos/{}/{}/releases/tags/{}", owner, repo, tag);
        self.get_json(cancel, &path, || PullError::ReleaseNotFound {
            repository: format!("{}/{}", owner, repo),
            tag: tag.to_string(),
        })
        .await
    }

    async fn get_latest_release(
        &self,
        cancel: &CancellationToken,
        owner: &str,
        repo: &str,
    ) -> Result<Release> {
        let path = format!("/repos/{}/{}/releases/latest", owner, repo);
        self.get_json(cancel, &path, || PullError::ReleaseNotFound {
            repository: format!("{}/{}", owner, repo),
            tag: "latest".to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn release_json() -> serde_json::Value {
        serde_json::json!({
            "name": "Release 1.2.3",
            "tag_name": "v1.2.3",
            "draft": false,
            "assets": [
                {
                    "name": "tool-v1.2.3.tar.gz",
                    "browser_download_url": "https://github.com/acme/tool/releases/download/v1.2.3/tool-v1.2.3.tar.gz",
                    "size": 1024
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_release_by_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tool/releases/tags/v1.2.3"))
            .and(header("Authorization", "Bearer ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_json()))
            .mount(&server)
            .await;

        let client = GitHubClient::new(server.uri(), Some("ghp_test".to_string())).unwrap();
        let release = client
            .get_release_by_tag(&CancellationToken::new(), "acme", "tool", "v1.2.3")
            .await
            .unwrap();

        assert_eq!(release.tag_name, "v1.2.3");
        assert_eq!(release.name.as_deref(), Some("Release 1.2.3"));
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].name, "tool-v1.2.3.tar.gz");
    }

    #[tokio::test]
    async fn test_latest_release() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tool/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_json()))
            .mount(&server)
            .await;

        let client = GitHubClient::new(format!("{}/", server.uri()), None).unwrap();
        let release = client
            .get_latest_release(&CancellationToken::new(), "acme", "tool")
            .await
            .unwrap();
        assert_eq!(release.tag_name, "v1.2.3");
    }

    #[tokio::test]
    async fn test_release_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GitHubClient::new(server.uri(), None).unwrap();
        let err = client
            .get_release_by_tag(&CancellationToken::new(), "acme", "tool", "v9.9.9")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "release v9.9.9 not found in acme/tool");
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let client = GitHubClient::new(server.uri(), None).unwrap();
        let err = client
            .get_latest_release(&CancellationToken::new(), "acme", "tool")
            .await
            .unwrap_err();
        assert!(matches!(err, PullError::RateLimited { retry_after: 30 }));
    }
}
