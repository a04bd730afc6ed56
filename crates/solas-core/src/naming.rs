//! Directory-name derivation for versioned release assets

use once_cell::sync::Lazy;
use regex::Regex;

/// Archive suffixes removed from asset names, in removal order
const ARCHIVE_SUFFIXES: &[&str] = &[".zip", ".gz", ".tar", ".tgz"];

/// `[-_]?v?MAJOR.MINOR.PATCH(-PRERELEASE(.N)?)?` anchored at the end of the name
static VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-_]?v?\d+\.\d+\.\d+(-[0-9A-Za-z]+(\.\d+)?)?$").expect("valid version regex")
});

/// Strip archive extensions, each at most once, in the fixed order
///
/// `.tar.gz` collapses to the bare name because `.gz` is removed before `.tar`.
pub fn strip_archive_extensions(name: &str) -> &str {
    ARCHIVE_SUFFIXES
        .iter()
        .fold(name, |acc, suffix| acc.strip_suffix(suffix).unwrap_or(acc))
}

/// Remove a trailing semver-like suffix such as `-v1.2.3` or `_1.0.0-rc.1`
///
/// Applied until the name stops changing, so the result has no version suffix
/// left and repeated application is a no-op.
pub fn strip_version_suffix(name: &str) -> &str {
    let mut current = name;
    while let Some(m) = VERSION_SUFFIX.find(current) {
        if m.start() == 0 {
            break;
        }
        current = &current[..m.start()];
    }
    current
}

/// Final directory name for a release asset file name
pub fn release_dir_name(asset_file_name: &str) -> String {
    let mut current = asset_file_name;
    loop {
        let next = strip_version_suffix(strip_archive_extensions(current));
        if next == current {
            return next.to_string();
        }
        current = next;
    }
}
