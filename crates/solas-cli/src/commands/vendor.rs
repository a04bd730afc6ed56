//! Vendor command - add a jsonnet dependency and install the dependency tree

use std::path::Path;
use std::sync::Arc;

use solas_pull::jsonnet::{Source, parse_dependency};
use solas_pull::{Artifact, CancellationToken, Git2Client, JsonnetBundler, SolasConfig, Strategy};

use crate::display;
use crate::error::Result;

pub async fn run(
    cancel: &CancellationToken,
    config: &SolasConfig,
    dependency: &str,
    dir: &Path,
    jsonnet_home: Option<String>,
) -> Result<()> {
    let credentials = config.scoped_credentials()?;
    let auth = match parse_dependency(dir, dependency)?.source {
        Source::Git(git) => credentials.for_url(&git.remote).cloned(),
        Source::Local(_) => None,
    };

    let jsonnet_home = jsonnet_home.unwrap_or_else(|| config.jsonnet.home.clone());
    let bundler = JsonnetBundler::new()
        .with_client(Arc::new(Git2Client::new()))
        .with_auth(auth)
        .with_jsonnet_home(&jsonnet_home);

    let artifact = Artifact::new(dependency, dir).with_url(dependency);
    let result = bundler.pull(cancel, &artifact).await?;

    display::print_vendored(dependency, &result.version, &dir.join(bundler.jsonnet_home()));
    Ok(())
}
