//! Resilient content retrieval for module payloads.
//!
//! This crate turns files and byte streams into owned [`Content`]:
//!
//! - **Two-tier reads**: files at or above a threshold
//!   ([`MIN_MMAPED_FILE_SIZE`] by default) are memory-mapped; anything
//!   smaller, or any file that fails to map, is read into a heap buffer.
//! - **Bounded allocation retry**: every buffer allocation is attempted,
//!   followed by at most one [`Reclaim`] pass and a single retry.
//! - **Strict sizing**: known-length reads must deliver exactly the declared
//!   size, and empty payloads are always rejected.
//!
//! All reads are blocking. Async callers should wrap them in
//! [`spawn_blocking`](https://docs.rs/tokio/latest/tokio/task/fn.spawn_blocking.html).

mod alloc;
mod content;
pub mod error;
mod read;

pub use crate::alloc::{Backoff, NoReclaim, Reclaim, ReclaimHandle};
pub use crate::content::Content;
pub use crate::read::Reader;

/// Files of at least this many bytes are memory-mapped.
pub const MIN_MMAPED_FILE_SIZE: u64 = 128 * 1024;
/// First buffer size for streams of unknown length.
pub const INITIAL_BUFFER_SIZE: usize = 256 * 1024;
