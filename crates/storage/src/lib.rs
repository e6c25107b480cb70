//! Content cache storage.
//!
//! Fetched module payloads are stored under their remote path (for example
//! `pub/modules/Protracker/Beispiel/track1.mod`) relative to a backend root.
//! Entries are published atomically and never partially overwritten.

pub mod backend;
pub mod error;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
