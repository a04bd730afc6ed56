//! Solas artifact puller
//!
//! Fetches artifacts into a local directory tree through one uniform entry
//! point. Each pull method is a [`Strategy`]:
//!
//! - **helm-chart**: charts from HTTP repositories or OCI registries
//! - **github-release**: release assets, picked by name and extension
//! - **http-archive**: `.zip`, `.tgz` and `.tar.gz` URLs
//! - **git**: repository checkouts, optionally narrowed to a subdirectory
//!
//! The [`Puller`] dispatcher refuses to overwrite an existing destination and
//! runs every pull inside a `pull` tracing span. Jsonnet-bundler installs go
//! through [`JsonnetBundler`] directly, since they add to a shared vendor tree.
//!
//! ## Example
//!
//! ```rust,no_run
//! use solas_pull::{Artifact, CancellationToken, PullMethod, Puller, SolasConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let puller = Puller::from_config(&SolasConfig::load()?)?;
//! let artifact = Artifact::new("kubeconform", "tools")
//!     .with_repository("yannh/kubeconform")
//!     .with_asset_name("kubeconform-linux-amd64");
//!
//! let result = puller
//!     .pull(&CancellationToken::new(), PullMethod::GithubRelease, &artifact)
//!     .await?;
//! println!("{} {}", result.directory.display(), result.version);
//! # Ok(())
//! # }
//! ```
//!
//! ## Staging
//!
//! Every pull works in a fresh `solas-*` directory under the system temp root
//! and installs with a single rename. The staging directory is removed on every
//! exit path, and a failed pull leaves the destination absent.

pub mod config;
pub mod credentials;
pub mod download;
pub mod error;
pub mod git;
pub mod github;
pub mod helm;
pub mod http_archive;
pub mod jsonnet;
pub mod puller;
pub mod strategy;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use config::{CredentialScope, SolasConfig};
pub use credentials::{Credentials, ResolvedCredentials, ScopedCredentials};
pub use download::{Downloader, HttpDownloader};
pub use error::{ErrorKind, PullError, Result, ResultExt};
pub use git::{Git2Client, GitClient, GitStrategy};
pub use github::{GitHubClient, GitHubReleaseStrategy, ReleaseClient};
pub use helm::{HelmChartStrategy, OciRegistryClient, RegistryClient};
pub use http_archive::HttpArchiveStrategy;
pub use jsonnet::JsonnetBundler;
pub use puller::{Puller, PullerBuilder};
pub use strategy::{PullMethod, PullOption, Strategy};

pub use solas_core::{ArchiveExtractor, Artifact, CancellationToken, Extractor, LATEST, PullResult};
