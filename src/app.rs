//! Assembly of the catalog stack from configuration.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use modvfs_cache::{CachePolicy, CachingCatalog, Database, Repository};
use modvfs_catalog::RemoteCatalog;
use modvfs_catalog::http::ReqwestProvider;
use modvfs_config::Config;
use modvfs_io::{Backoff, Reader};
use modvfs_storage::backend::LocalBackend;
use modvfs_vfs::Vfs;
use std::sync::Arc;

pub struct App {
    pub vfs: Vfs,
    pub database: Database,
}

impl App {
    /// Build the stack: index, content cache, remote catalog, caching
    /// catalog, resolver. Nothing here is global; every part is passed in.
    pub async fn assemble(config: &Config) -> Result<Self> {
        let index_path = config.cache.index_path().or_raise(|| ErrorKind::Config)?;
        let content_root = config.cache.content_directory().or_raise(|| ErrorKind::Config)?;
        let catalog_url = config.remote.catalog_url().or_raise(|| ErrorKind::Config)?;
        let storage_url = config.remote.storage_url().or_raise(|| ErrorKind::Config)?;
        tracing::debug!(index = %index_path.display(), content = %content_root.display(), "Opening caches");

        let reader = Reader::new()
            .with_mmap_threshold(config.io.mmap_threshold)
            .with_initial_buffer(config.io.initial_buffer)
            .with_reclaim(Backoff::default());

        let database = Database::connect(&index_path).await.or_raise(|| ErrorKind::Index)?;
        let content_root = std::path::absolute(&content_root).or_raise(|| ErrorKind::Storage)?;
        let content = LocalBackend::new("content", &content_root)
            .or_raise(|| ErrorKind::Storage)?
            .with_reader(reader.clone());

        let http = ReqwestProvider::new().or_raise(|| ErrorKind::Remote)?;
        let remote = RemoteCatalog::new(Arc::new(http), catalog_url, storage_url.clone()).with_reader(reader);

        let policy = CachePolicy { ttl: config.cache.ttl(), serve_stale: config.cache.serve_stale };
        let catalog = CachingCatalog::new(Arc::new(remote), Repository::from(&database), Arc::new(content))
            .with_policy(policy);

        let vfs = Vfs::new(config.scheme.clone(), Arc::new(catalog), storage_url);
        Ok(Self { vfs, database })
    }

    pub fn repository(&self) -> Repository {
        Repository::from(&self.database)
    }

    pub async fn close(self) {
        self.database.close().await;
    }
}
