//! Dependency spec strings as accepted on the command line

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::error::{PullError, Result};
use crate::jsonnet::file::Dependency;

/// Version used when a Git dependency names none
pub const DEFAULT_GIT_VERSION: &str = "master";

static GITHUB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^github\.com/(?P<user>[-_.a-zA-Z0-9]+)/(?P<repo>[-_.a-zA-Z0-9]+?)(?:\.git)?(?P<subdir>/[^@]+)?(?:@(?P<version>.+))?$",
    )
    .expect("valid regex")
});

static SCHEME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<remote>(?:https|ssh|git\+ssh)://[^/@]+(?:@[^/]+)?/[-_./a-zA-Z0-9]+?\.git)(?P<subdir>/[^@]+)?(?:@(?P<version>.+))?$",
    )
    .expect("valid regex")
});

static SCP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<remote>[-_.a-zA-Z0-9]+@[-_.a-zA-Z0-9]+:[-_./a-zA-Z0-9]+?\.git)(?P<subdir>/[^@]+)?(?:@(?P<version>.+))?$",
    )
    .expect("valid regex")
});

/// Parse `spec` into a dependency record
///
/// Local directories are resolved relative to `base_dir` and recorded as given.
pub fn parse_dependency(base_dir: &Path, spec: &str) -> Result<Dependency> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(PullError::InvalidDependency {
            spec: spec.to_string(),
            reason: "empty dependency".to_string(),
        });
    }

    if let Some(caps) = GITHUB.captures(spec) {
        let remote = format!("https://github.com/{}/{}.git", &caps["user"], &caps["repo"]);
        return Ok(git_dependency(remote, &caps));
    }

    for pattern in [&*SCHEME, &*SCP] {
        if let Some(caps) = pattern.captures(spec) {
            let remote = caps["remote"].to_string();
            return Ok(git_dependency(remote, &caps));
        }
    }

    if base_dir.join(spec).is_dir() {
        return Ok(Dependency::local(spec));
    }

    Err(PullError::InvalidDependency {
        spec: spec.to_string(),
        reason: "neither a Git remote nor an existing local directory".to_string(),
    })
}

fn git_dependency(remote: String, caps: &regex::Captures<'_>) -> Dependency {
    let subdir = caps
        .name("subdir")
        .map(|m| m.as_str().trim_matches('/'))
        .unwrap_or_default();
    let version = caps
        .name("version")
        .map(|m| m.as_str())
        .unwrap_or(DEFAULT_GIT_VERSION);
    Dependency::git(remote, subdir, version)
}
