//! Solas Core - shared building blocks of the artifact puller
//!
//! This crate provides the pieces every pull strategy relies on:
//! - `Artifact` / `PullResult`: the descriptor and the outcome of a pull
//! - `archive`: hardened zip and tar.gz extraction with a per-file size cap
//! - `safepath`: root-confined path resolution
//! - `staging`: scoped temp directories and atomic promotion
//! - `naming`: directory names derived from versioned release assets

pub mod archive;
pub mod artifact;
pub mod error;
pub mod naming;
pub mod safepath;
pub mod staging;

pub use archive::{ArchiveExtractor, Extractor, MAX_FILE_SIZE, is_archive, uncompress, unpack_tree};
pub use artifact::{Artifact, LATEST, PullResult, first_non_empty};
pub use error::{CoreError, Result};
pub use naming::{release_dir_name, strip_archive_extensions, strip_version_suffix};
pub use safepath::{is_local, safe_path};
pub use staging::{Staging, copy_tree, promote};

pub use tokio_util::sync::CancellationToken;
