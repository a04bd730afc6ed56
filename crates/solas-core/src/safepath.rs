//! Root-confined path resolution
//!
//! [`safe_path`] turns an untrusted path into an absolute path that is proven to
//! lie inside a root directory, after resolving every symlink that already exists
//! on disk. The archive extractor, the HTTP fetch and the Git subdirectory logic
//! all go through it.

use std::path::{Component, Path, PathBuf};

use crate::error::{CoreError, Result};

/// Resolve `path` against `root`, failing if the result leaves `root`
///
/// Relative paths are interpreted relative to `root`. Symlinks are resolved for
/// the longest prefix that exists; the remaining components are appended as-is.
pub fn safe_path(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let path = path.as_ref();

    validate(root)?;
    validate(path)?;

    let root = resolve_existing(&absolutize(root)?)?;
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    let resolved = resolve_existing(&clean(&joined))?;

    if !is_within(&root, &resolved) {
        return Err(CoreError::PathEscape {
            root,
            path: resolved,
        });
    }

    Ok(resolved)
}

/// Whether `path` is a strictly local relative path
///
/// Local paths are non-empty, relative, and contain no parent-directory
/// components, so joining them onto any directory stays inside it.
pub fn is_local(path: &str) -> bool {
    if path.is_empty() || path.contains('\0') {
        return false;
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return false;
    }
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn validate(path: &Path) -> Result<()> {
    let text = path.to_string_lossy();
    if text.is_empty() {
        return Err(CoreError::InvalidPath {
            path: String::new(),
            reason: "path is empty".to_string(),
        });
    }
    if text.contains('\0') {
        return Err(CoreError::InvalidPath {
            path: text.replace('\0', "\\0"),
            reason: "path contains a null byte".to_string(),
        });
    }
    Ok(())
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(clean(path))
    } else {
        Ok(clean(&std::env::current_dir()?.join(path)))
    }
}

/// Lexically normalize a path: drop `.`, fold `..` into its parent
///
/// `..` at the root stays at the root, matching how the kernel resolves it.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// Canonicalize the longest existing prefix of an absolute, cleaned path
fn resolve_existing(path: &Path) -> Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();

    loop {
        match std::fs::canonicalize(&existing) {
            Ok(resolved) => {
                let mut out = resolved;
                for part in rest.iter().rev() {
                    out.push(part);
                }
                return Ok(out);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let Some(name) = existing.file_name().map(|n| n.to_os_string()) else {
                    return Ok(path.to_path_buf());
                };
                rest.push(name);
                if !existing.pop() {
                    return Ok(path.to_path_buf());
                }
            }
            Err(e) => return Err(CoreError::Io(e)),
        }
    }
}

#[cfg(not(windows))]
fn is_within(root: &Path, path: &Path) -> bool {
    path.starts_with(root)
}

#[cfg(windows)]
fn is_within(root: &Path, path: &Path) -> bool {
    let fold = |p: &Path| {
        p.components()
            .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
            .collect::<Vec<_>>()
    };
    let root = fold(root);
    let path = fold(path);
    path.len() >= root.len() && path[..root.len()] == root[..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relative_path_inside_root() {
        let temp = TempDir::new().unwrap();
        let resolved = safe_path(temp.path(), "a/b/file.txt").unwrap();
        let root = std::fs::canonicalize(temp.path()).unwrap();
        assert_eq!(resolved, root.join("a/b/file.txt"));
    }

    #[test]
    fn test_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let err = safe_path(temp.path(), "../../etc/passwd").unwrap_err();
        assert!(matches!(err, CoreError::PathEscape { .. }));

        // Folding back into the root is fine
        assert!(safe_path(temp.path(), "a/../b").is_ok());
    }

    #[test]
    fn test_rejects_empty_and_nul() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            safe_path(temp.path(), ""),
            Err(CoreError::InvalidPath { .. })
        ));
        assert!(matches!(
            safe_path(temp.path(), "a\0b"),
            Err(CoreError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_absolute_path_outside_root() {
        let temp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        assert!(safe_path(temp.path(), other.path().join("x")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();

        // The link target exists outside the root, even though the leaf does not
        let err = safe_path(temp.path(), "link/new-file").unwrap_err();
        assert!(matches!(err, CoreError::PathEscape { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("real")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("link")).unwrap();

        let resolved = safe_path(temp.path(), "link/file").unwrap();
        let root = std::fs::canonicalize(temp.path()).unwrap();
        assert_eq!(resolved, root.join("real/file"));
    }

    #[test]
    fn test_is_local() {
        assert!(is_local("charts/nginx"));
        assert!(is_local("./lib"));
        assert!(!is_local(""));
        assert!(!is_local("/etc"));
        assert!(!is_local("../outside"));
        assert!(!is_local("a/../../b"));
        assert!(!is_local("a/.."));
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean(Path::new("/../a")), PathBuf::from("/a"));
    }
}
