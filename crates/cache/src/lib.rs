//! Persistent catalog index and read-through caching.
//!
//! The index is a disposable SQLite database: bucket listings and group
//! track listings are stored as whole record sets, each with the time it was
//! last refreshed from the remote catalog. [`CachingCatalog`] puts the index
//! and a content cache ([`modvfs_storage::StorageBackend`]) in front of any
//! other [`modvfs_catalog::Catalog`].

mod caching;
mod db;
pub mod error;
mod locks;
mod models;
mod repo;

pub use crate::caching::{CachePolicy, CachingCatalog};
pub use crate::db::Database;
pub use crate::models::Scope;
pub use crate::repo::{Repository, Statistics, TableStatistics};
