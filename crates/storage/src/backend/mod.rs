//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, the content cache's view
//! of wherever payload bytes are kept.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
use crate::error::Result;
use async_trait::async_trait;
use modvfs_io::Content;
use std::path::Path;

/// Unified interface for content cache backends.
///
/// Only existence checks, whole reads and whole writes are supported; a
/// cached entry is either fully present or absent.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use modvfs_storage::{backend::StorageBackend, error::Result};
///
/// async fn cached_size(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("pub/modules/Protracker/Beispiel/track1.mod");
///     if backend.exists(path).await? {
///         let content = backend.read(path).await?;
///         Ok(content.len() as u64)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist, and [`Content`](crate::error::ErrorKind::Content) if
    /// it exists but is empty or unreadable.
    async fn read(&self, path: &Path) -> Result<Content>;

    /// Write file contents.
    ///
    /// Creates a new file or replaces an existing one. Readers observe either
    /// the previous file or the complete new one, never a partial write.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;
}
