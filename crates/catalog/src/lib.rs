//! Catalog contract for module archives.
//!
//! A [`Catalog`] answers four questions per [`Grouping`] (authors,
//! collections, formats): which groups sit in a letter [`Bucket`], what is
//! group `id`, which tracks does it hold, and is there a track with a given
//! filename. It also fetches track content.
//!
//! Listings are lazy [`Listing`] streams of [`ListEvent`]s: an optional
//! count hint, then the items. Dropping a listing cancels it.
//!
//! [`RemoteCatalog`] implements the contract over paginated listing pages and
//! an [`HttpProvider`](http::HttpProvider). A reference provider built on
//! `reqwest` is available with the `http` feature; test doubles live in
//! [`mock`] behind the `mock` feature.

pub mod error;
pub mod http;
mod listing;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod models;
mod remote;

pub use crate::listing::{ListEvent, Listing, collect, from_items, visit};
pub use crate::models::{Bucket, Group, Grouping, Track};
pub use crate::remote::RemoteCatalog;
pub use modvfs_io::Content;

use crate::error::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use std::sync::Arc;

/// Data access for one archive.
///
/// Every operation may fail with a transport or parse failure. Absence is a
/// normal result: `None` or an empty listing.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Groups listed under `bucket`. Order is stable for the same data.
    fn query_groups<'a>(&'a self, grouping: Grouping, bucket: Bucket) -> Listing<'a, Group>;

    /// A single group, or `None` if `id` is unknown.
    async fn query_group(&self, grouping: Grouping, id: u32) -> Result<Option<Group>>;

    /// Tracks of group `id`. Unknown ids produce an empty listing.
    fn query_tracks<'a>(&'a self, grouping: Grouping, id: u32) -> Listing<'a, Track>;

    /// Exact filename match within group `id`.
    ///
    /// The default scans [`query_tracks`](Self::query_tracks) and stops at
    /// the first match.
    async fn find_track(&self, grouping: Grouping, id: u32, filename: &str) -> Result<Option<Track>> {
        let mut tracks = self.query_tracks(grouping, id);
        while let Some(event) = tracks.try_next().await? {
            if let ListEvent::Item(track) = event
                && track.filename == filename
            {
                return Ok(Some(track));
            }
        }
        Ok(None)
    }

    /// Content of the track at `path` (starting from `/pub/`).
    async fn track_content(&self, path: &str) -> Result<Content>;
}

pub type CatalogHandle = Arc<dyn Catalog>;
