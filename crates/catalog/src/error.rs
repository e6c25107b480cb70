//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Lower layers (content I/O, the
//! persistent index, the content cache) are kept as children of these
//! frames.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// "Not found" is never an error: lookups return `None` and listings end empty.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote could not complete a request.
    #[display("transport failure: {_0}")]
    Transport(#[error(not(source))] String),
    /// A listing page did not have the expected structure.
    #[display("malformed listing: {_0}")]
    Parse(#[error(not(source))] String),
    /// A payload could not be loaded (empty, wrong size, out of memory).
    #[display("unreadable content: {_0}")]
    Content(#[error(not(source))] String),
    /// The persistent index failed.
    #[display("index failure")]
    Index,
    /// The content cache failed.
    #[display("content cache failure")]
    Storage,
    /// Bucket is neither a single uppercase ASCII letter nor `#`.
    #[display("invalid bucket: {_0:?}")]
    InvalidBucket(#[error(not(source))] String),
    /// The catalog refused to serve (used for failure injection).
    #[display("catalog unavailable")]
    Unavailable,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Unavailable | Self::Index | Self::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::InvalidBucket("1".to_string()).to_string(), r#"invalid bucket: "1""#);
        assert_eq!(
            ErrorKind::Transport("https://ftp.modland.com/x".to_string()).to_string(),
            "transport failure: https://ftp.modland.com/x"
        );
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Transport(String::new()).is_retryable());
        assert!(ErrorKind::Unavailable.is_retryable());
        assert!(!ErrorKind::Parse(String::new()).is_retryable());
        assert!(!ErrorKind::InvalidBucket(String::new()).is_retryable());
    }
}
