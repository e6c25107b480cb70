//! Path validation and security utilities.
//!
//! Remote archive paths arrive from parsed listing pages, so they are
//! validated before being joined onto a cache root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path for security and correctness.
/// Ensures that paths don't escape the storage root (no `..` traversal).
/// Leading slashes are dropped, so remote paths can be used as-is.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use modvfs_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("pub/modules/Protracker/Beispiel/track1.mod").is_ok());
/// assert!(validate_path("pub/../pub/intro.mod").is_ok());
/// // Invalid paths
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("pub/../../b").is_err());
/// assert!(validate_path("a\0b").is_err());
/// // Remote paths are made relative
/// assert_eq!(
///     validate_path("/pub/modules/./Fasttracker 2/x.xm").unwrap(),
///     Path::new("pub/modules/Fasttracker 2/x.xm")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes survive Path::components() on Unix but truncate
                // in syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}
