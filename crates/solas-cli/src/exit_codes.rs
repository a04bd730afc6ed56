//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - missing collaborator, bad config file
pub const CONFIG_ERROR: i32 = 2;

/// Precondition error - destination exists, bad subdir, not an archive
pub const PRECONDITION_ERROR: i32 = 3;

/// Remote error - network, registry, GitHub or git failure
pub const REMOTE_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Archive error - corrupt archive, path traversal, size cap
pub const ARCHIVE_ERROR: i32 = 6;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Interrupted by Ctrl-C (128 + SIGINT)
pub const CANCELLED: i32 = 130;
