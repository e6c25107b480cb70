//! Content I/O Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A content I/O error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for content I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Content has no bytes at all. Never a valid module file.
    #[display("empty content")]
    Empty,
    /// A read of declared length delivered a different number of bytes.
    #[display("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    /// Declared size cannot be addressed on this platform.
    #[display("content too large: {_0} bytes")]
    TooLarge(#[error(not(source))] u64),
    /// Underlying I/O error. Allocation failures that survive the retry are
    /// reported here as [`std::io::ErrorKind::OutOfMemory`].
    #[display("I/O error: {_0}")]
    Io(IoError),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns `true` if this error was caused by memory exhaustion.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == std::io::ErrorKind::OutOfMemory)
    }
}
