//! HTTP downloads with redirect protection
//!
//! Credentials are attached only while a request stays on the origin of the
//! URL the caller asked for; a redirect to another host (release asset CDNs,
//! object stores) continues anonymously.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::credentials::{ScopedCredentials, same_origin};
use crate::error::{PullError, Result};

const MAX_REDIRECTS: u32 = 10;

/// Fetches a URL into a local file
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to `local_path`, returning the number of bytes written
    async fn download(
        &self,
        cancel: &CancellationToken,
        url: &str,
        local_path: &Path,
    ) -> Result<u64>;
}

/// reqwest-backed [`Downloader`]
pub struct HttpDownloader {
    client: reqwest::Client,
    credentials: ScopedCredentials,
}

impl HttpDownloader {
    pub fn new(credentials: ScopedCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Redirects are followed by hand so credentials never cross origins
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("solas/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PullError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            credentials,
        })
    }

    /// Create without credentials (public sources)
    pub fn public() -> Result<Self> {
        Self::new(ScopedCredentials::default())
    }

    /// Issue a GET, following same-client redirects by hand
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut current_url = url.to_string();
        let mut redirects = 0;

        loop {
            let mut request = self.client.get(&current_url);

            if same_origin(url, &current_url) {
                if let Some(creds) = self.credentials.for_url(&current_url) {
                    request = request.header(reqwest::header::AUTHORIZATION, creds.auth_header());
                }
            } else if !self.credentials.is_empty() {
                tracing::debug!(
                    "Cross-origin redirect from {} to {}, credentials not forwarded",
                    url,
                    current_url
                );
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_redirection() {
                redirects += 1;
                if redirects > MAX_REDIRECTS {
                    return Err(PullError::NetworkError {
                        message: format!("Too many redirects (max {})", MAX_REDIRECTS),
                    });
                }

                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| PullError::NetworkError {
                        message: "Redirect without Location header".to_string(),
                    })?;

                current_url = Url::parse(&current_url)?.join(location)?.to_string();
                continue;
            }

            return check_status(response, &current_url);
        }
    }
}

/// Map non-success statuses onto remote errors
pub(crate) fn check_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        return Err(PullError::RateLimited { retry_after });
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(PullError::AuthRequired {
            url: url.to_string(),
        });
    }
    if status == reqwest::StatusCode::FORBIDDEN {
        return Err(PullError::AuthFailed {
            message: format!("Access denied to {}", url),
        });
    }
    if !status.is_success() {
        return Err(PullError::HttpError {
            status: status.as_u16(),
            message: format!("Request to {} failed", url),
        });
    }
    Ok(response)
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(
        &self,
        cancel: &CancellationToken,
        url: &str,
        local_path: &Path,
    ) -> Result<u64> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(PullError::Cancelled),
            response = self.get(url) => response?,
        };

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(local_path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(PullError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!("Downloaded {} ({} bytes)", url, written);
        Ok(written)
    }
}
