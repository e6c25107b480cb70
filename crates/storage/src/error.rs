//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use modvfs_io::error::{Error as ContentError, ErrorKind as ContentErrorKind};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Path contains invalid characters or escapes root
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Stored bytes could not be loaded (empty, truncated, out of memory).
    #[display("unreadable content: {}", _0.display())]
    Content(#[error(not(source))] PathBuf),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}
impl ErrorKind {
    /// Convert a content read error into a storage error, keeping the I/O
    /// crate's error tree as a child. A missing file becomes
    /// [`NotFound`](Self::NotFound).
    #[track_caller]
    pub fn content(err: ContentError, path: &Path) -> Error {
        let kind = match &*err {
            ContentErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ContentErrorKind::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied(path.to_path_buf())
            },
            _ => Self::Content(path.to_path_buf()),
        };
        err.raise(kind)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::BackendError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_not_found_maps_to_not_found() {
        let err = ContentError::from(ContentErrorKind::Io(std::io::ErrorKind::NotFound.into()));
        let converted = ErrorKind::content(err, Path::new("pub/a.mod"));
        assert!(matches!(&*converted, ErrorKind::NotFound(p) if p == Path::new("pub/a.mod")));
    }

    #[test]
    fn content_empty_maps_to_content() {
        let err = ContentError::from(ContentErrorKind::Empty);
        let converted = ErrorKind::content(err, Path::new("pub/a.mod"));
        assert!(matches!(&*converted, ErrorKind::Content(_)));
        assert!(!converted.is_retryable());
    }
}
