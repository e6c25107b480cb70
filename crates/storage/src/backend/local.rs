//! Local filesystem storage backend.
//!
//! Files are stored in a configured directory. Reads go through
//! [`modvfs_io::Reader`] on the blocking pool so that large payloads are
//! memory-mapped; writes are published by renaming a temporary sibling.

use crate::error::ErrorKind;
use crate::{StorageBackend, error::Result, path::validate as validate_path};
use async_trait::async_trait;
use exn::ResultExt;
use modvfs_io::{Content, Reader};
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use modvfs_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("content", "/var/cache/modvfs/content")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory for cached content
    root: PathBuf,
    reader: Reader,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists and is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once at assembly; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }

        Ok(Self { name: name.into(), root, reader: Reader::default() })
    }

    /// Use a custom reader (mmap threshold, buffer size, reclamation hook).
    pub fn with_reader(mut self, reader: Reader) -> Self {
        self.reader = reader;
        self
    }

    /// Get the absolute path for a relative storage path.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn temporary_sibling(path: &Path) -> PathBuf {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        name.push(format!(".{}-{unique}.part", std::process::id()));
        path.with_file_name(name)
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, path: &Path) -> Result<Content> {
        let abs_path = self.absolute_path(path)?;
        let reader = self.reader.clone();
        let relative = path.to_path_buf();
        tokio::task::spawn_blocking(move || reader.read_file(&abs_path).map_err(|e| ErrorKind::content(e, &relative)))
            .await
            .or_raise(|| ErrorKind::BackendError("blocking read task failed".to_string()))?
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        let temp_path = Self::temporary_sibling(&abs_path);
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            exn::bail!(Self::map_io_error(e, path));
        }
        if let Err(e) = fs::rename(&temp_path, &abs_path).await {
            let _ = fs::remove_file(&temp_path).await;
            exn::bail!(Self::map_io_error(e, path));
        }
        tracing::debug!(backend = %self.name, path = %path.display(), bytes = data.len(), "Stored content");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    use super::*;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("content");
        LocalBackend::new("name", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let expected = temp_dir.path().join("pub/modules/Protracker/track1.mod");
        assert_eq!(backend.absolute_path(Path::new("/pub/modules/Protracker/track1.mod")).unwrap(), expected);
        assert!(backend.absolute_path(Path::new("../etc/passwd")).is_err());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let data = b"M.K. module data";
        backend.write(Path::new("pub/a/track.mod"), data).await.unwrap();
        let content = backend.read(Path::new("pub/a/track.mod")).await.unwrap();
        assert_eq!(&*content, data);
        assert!(!content.is_mapped());
    }

    #[tokio::test]
    async fn test_large_reads_are_mapped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let data = vec![0x55u8; 300 * 1024];
        backend.write(Path::new("big.xm"), &data).await.unwrap();
        let content = backend.read(Path::new("big.xm")).await.unwrap();
        assert!(content.is_mapped());
        assert_eq!(&*content, data.as_slice());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("file.mod"), b"first version, longer").await.unwrap();
        backend.write(Path::new("file.mod"), b"second").await.unwrap();
        assert_eq!(&*backend.read(Path::new("file.mod")).await.unwrap(), b"second");
        // No temporary files left behind.
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(!backend.exists(Path::new("nonexistent.mod")).await.unwrap());
        backend.write(Path::new("exists.mod"), b"data").await.unwrap();
        assert!(backend.exists(Path::new("exists.mod")).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let err = backend.read(Path::new("missing.mod")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_empty_is_content_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        std::fs::write(temp_dir.path().join("empty.mod"), b"").unwrap();
        let err = backend.read(Path::new("empty.mod")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Content(_)));
    }

    #[tokio::test]
    async fn test_path_security() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.read(Path::new("etc/../../passwd")).await.is_err());
        assert!(backend.write(Path::new("../etc/passwd"), b"data").await.is_err());
    }
}
