//! Pull command - fetch one artifact, or every artifact in a list file

use serde::Deserialize;
use std::path::{Path, PathBuf};

use solas_pull::{Artifact, CancellationToken, PullMethod, Puller, SolasConfig};

use crate::display::{self, PulledArtifact};
use crate::error::{CliError, Result};

/// Entry of a pull list file
#[derive(Debug, Deserialize)]
struct ListEntry {
    #[serde(default)]
    method: Option<PullMethod>,

    #[serde(flatten)]
    artifact: Artifact,
}

/// Base directory from the flag, then the config, then the working directory
pub fn base_dir(flag: Option<PathBuf>, config: &SolasConfig) -> PathBuf {
    flag.or_else(|| config.base_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Pull a single artifact
pub async fn run(
    cancel: &CancellationToken,
    config: &SolasConfig,
    method: PullMethod,
    artifact: &Artifact,
    json: bool,
) -> Result<()> {
    let puller = Puller::from_config(config)?;
    let result = puller.pull(cancel, method, artifact).await?;

    let pulled = PulledArtifact::new(&artifact.name, method, &result);
    if json {
        display::print_json(std::slice::from_ref(&pulled))
            .map_err(|e| CliError::internal(e.to_string()))?;
    } else {
        display::print_pulled(&pulled);
    }
    Ok(())
}

/// Pull every artifact listed in `file`, stopping at the first failure
pub async fn run_file(
    cancel: &CancellationToken,
    config: &SolasConfig,
    file: &Path,
    method: Option<PullMethod>,
    base_dir_flag: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(file)?;
    let entries: Vec<ListEntry> = serde_yaml::from_str(&content).map_err(|e| {
        CliError::usage_with_help(
            format!("invalid pull list {}: {}", file.display(), e),
            "expected a YAML list of artifacts with a `method` and a `name`",
        )
    })?;

    let default_base = base_dir(base_dir_flag, config);
    let mut planned = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        let method = entry.method.or(method).ok_or_else(|| {
            CliError::usage_with_help(
                format!("entry {} ({}) names no pull method", i + 1, entry.artifact.name),
                "set `method` on the entry or pass --method",
            )
        })?;
        let mut artifact = entry.artifact;
        if artifact.base_dir.as_os_str().is_empty() {
            artifact.base_dir = default_base.clone();
        }
        planned.push((method, artifact));
    }

    let puller = Puller::from_config(config)?;
    let mut results = Vec::with_capacity(planned.len());
    for (method, artifact) in &planned {
        let result = puller.pull(cancel, *method, artifact).await?;
        if !json {
            display::print_pulled(&PulledArtifact::new(&artifact.name, *method, &result));
        }
        results.push(result);
    }

    if json {
        let pulled: Vec<_> = planned
            .iter()
            .zip(&results)
            .map(|((method, artifact), result)| PulledArtifact::new(&artifact.name, *method, result))
            .collect();
        display::print_json(&pulled).map_err(|e| CliError::internal(e.to_string()))?;
    }
    Ok(())
}
