//! VFS Error Types

use derive_more::{Display, Error};

/// A VFS error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for VFS operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The identifier does not follow the grammar.
    #[display("malformed identifier: {_0}")]
    Malformed(#[error(not(source))] String),
    /// A catalog lookup failed. The catalog error is the child frame.
    #[display("catalog failure")]
    Catalog,
    /// Content was requested from a directory.
    #[display("not a file: {_0}")]
    NotAFile(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Catalog)
    }
}
