//! Archive extraction for pulled artifacts
//!
//! Supports `.zip`, `.tgz` and `.tar.gz`. Every output path is resolved through
//! [`safe_path`] so that entries can never escape the destination directory, and
//! every regular file is copied through a size-capped reader.
//!
//! The default extraction flattens the archive: only the basename of each entry is
//! kept. [`unpack_tree`] keeps the archive layout and is used for Helm charts.

use flate2::read::GzDecoder;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use crate::error::{CoreError, Result};
use crate::safepath::safe_path;

/// Per-file cap on decompressed bytes (1 GiB)
pub const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Supported archive suffixes
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".tgz", ".tar.gz"];

const DIR_MODE: u32 = 0o755;
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Whether `name` ends with a supported archive extension
pub fn is_archive(name: &str) -> bool {
    ARCHIVE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Something that can turn an archive file into a directory of files
///
/// Strategies accept any implementation so alternatives or test doubles can be
/// injected.
pub trait Extractor: Send + Sync {
    /// Decompress `source` into `destination`
    fn uncompress(
        &self,
        cancel: &CancellationToken,
        source: &Path,
        destination: &Path,
    ) -> Result<()>;
}

/// Hardened zip / tar.gz extractor
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    max_file_size: u64,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-file decompressed size cap
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Extract a tar.gz archive keeping its directory layout
    pub fn unpack_tree(
        &self,
        cancel: &CancellationToken,
        source: &Path,
        destination: &Path,
    ) -> Result<()> {
        let file = open_source(source)?;
        fs::create_dir_all(destination)?;
        self.extract_tar(cancel, GzDecoder::new(file), destination, Layout::Preserve)
    }

    fn extract_tar<R: Read>(
        &self,
        cancel: &CancellationToken,
        reader: R,
        destination: &Path,
        layout: Layout,
    ) -> Result<()> {
        let mut archive = Archive::new(reader);

        for entry in archive.entries()? {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let mut entry = entry?;
            let raw = entry.path()?.into_owned();
            let Some(relative) = layout.output_path(&raw)? else {
                continue;
            };
            let entry_type = entry.header().entry_type();

            if entry_type.is_dir() {
                create_dir(destination, &relative)?;
            } else if entry_type.is_file() {
                let mode = entry.header().mode().unwrap_or(DEFAULT_FILE_MODE);
                self.write_file(destination, &relative, &raw, mode, &mut entry)?;
            } else {
                tracing::debug!(
                    "Skipping {:?} entry {} in tar archive",
                    entry_type,
                    raw.display()
                );
            }
        }

        Ok(())
    }

    fn extract_zip<R: Read + Seek>(
        &self,
        cancel: &CancellationToken,
        reader: R,
        destination: &Path,
    ) -> Result<()> {
        let mut archive = ZipArchive::new(reader)?;

        for i in 0..archive.len() {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let mut entry = archive.by_index(i)?;
            let raw = PathBuf::from(entry.name());
            let Some(relative) = Layout::Flatten.output_path(&raw)? else {
                continue;
            };

            if entry.is_dir() {
                create_dir(destination, &relative)?;
            } else if entry.is_symlink() {
                tracing::debug!("Skipping symlink {} in zip archive", raw.display());
            } else if entry.is_file() {
                let mode = entry.unix_mode().unwrap_or(DEFAULT_FILE_MODE);
                self.write_file(destination, &relative, &raw, mode, &mut entry)?;
            }
        }

        Ok(())
    }

    fn write_file(
        &self,
        destination: &Path,
        relative: &Path,
        raw: &Path,
        mode: u32,
        reader: &mut impl Read,
    ) -> Result<()> {
        let target = safe_path(destination, relative)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode & 0o7777);
        }
        #[cfg(not(unix))]
        let _ = mode;

        let mut out = options.open(&target)?;
        copy_capped(reader, &mut out, self.max_file_size).map_err(|e| match e {
            CoreError::SizeLimitExceeded { limit, .. } => CoreError::SizeLimitExceeded {
                entry: raw.display().to_string(),
                limit,
            },
            other => other,
        })?;
        Ok(())
    }
}

impl Extractor for ArchiveExtractor {
    fn uncompress(
        &self,
        cancel: &CancellationToken,
        source: &Path,
        destination: &Path,
    ) -> Result<()> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_archive(&name) {
            return Err(CoreError::NotAnArchive { name });
        }

        tracing::debug!(
            "Uncompressing {} into {}",
            source.display(),
            destination.display()
        );

        let file = open_source(source)?;
        fs::create_dir_all(destination)?;

        if name.ends_with(".zip") {
            self.extract_zip(cancel, file, destination)
        } else {
            self.extract_tar(cancel, GzDecoder::new(file), destination, Layout::Flatten)
        }
    }
}

/// Uncompress with the default extractor and no cancellation
pub fn uncompress(source: &Path, destination: &Path) -> Result<()> {
    ArchiveExtractor::default().uncompress(&CancellationToken::new(), source, destination)
}

/// Unpack a tar.gz keeping its layout, with the default size cap
pub fn unpack_tree(cancel: &CancellationToken, source: &Path, destination: &Path) -> Result<()> {
    ArchiveExtractor::default().unpack_tree(cancel, source, destination)
}

#[derive(Debug, Clone, Copy)]
enum Layout {
    /// Keep only the entry basename
    Flatten,
    /// Keep the full relative entry path
    Preserve,
}

impl Layout {
    /// Relative output path for an entry, `None` for entries with no name
    fn output_path(self, raw: &Path) -> Result<Option<PathBuf>> {
        let mut parts: Vec<OsString> = Vec::new();
        for component in raw.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_os_string()),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(CoreError::PathTraversal {
                        entry: raw.display().to_string(),
                    });
                }
            }
        }

        Ok(match self {
            Layout::Flatten => parts.pop().map(PathBuf::from),
            Layout::Preserve if parts.is_empty() => None,
            Layout::Preserve => Some(parts.iter().collect()),
        })
    }
}

fn open_source(source: &Path) -> Result<File> {
    let parent = match source.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = source.file_name().ok_or_else(|| CoreError::InvalidPath {
        path: source.display().to_string(),
        reason: "archive path has no file name".to_string(),
    })?;
    Ok(File::open(safe_path(parent, name)?)?)
}

fn create_dir(destination: &Path, relative: &Path) -> Result<()> {
    let target = safe_path(destination, relative)?;
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(&target)?;
    Ok(())
}

/// Copy at most `limit` bytes, failing if the reader holds more
fn copy_capped(reader: &mut impl Read, writer: &mut impl io::Write, limit: u64) -> Result<u64> {
    let written = io::copy(&mut reader.by_ref().take(limit), writer)?;
    if written == limit {
        let mut probe = [0u8; 1];
        loop {
            match reader.read(&mut probe) {
                Ok(0) => break,
                Ok(_) => {
                    return Err(CoreError::SizeLimitExceeded {
                        entry: String::new(),
                        limit,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(written)
}
