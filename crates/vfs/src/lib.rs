//! Virtual filesystem over a module archive catalog.
//!
//! [`Location`] is the identifier codec; [`Node`] the value-like node model;
//! [`Vfs`] binds a scheme and a [`Catalog`](modvfs_catalog::Catalog) to turn
//! identifiers into nodes, enumerate directories and fetch file content.
//! No tree is ever kept in memory: ancestry comes from decoding identifiers.

pub mod error;
mod location;
mod node;

pub use crate::location::{GroupRef, Location};
pub use crate::node::Node;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::TryStreamExt;
use modvfs_catalog::{Bucket, CatalogHandle, Content, Grouping, Listing, Track, from_items};
use percent_encoding::percent_decode_str;
use tracing::instrument;
use url::Url;

/// Resolver binding the identifier scheme to a catalog.
#[derive(Clone)]
pub struct Vfs {
    scheme: String,
    catalog: CatalogHandle,
    storage_url: Url,
}

impl Vfs {
    pub fn new(scheme: impl Into<String>, catalog: CatalogHandle, storage_url: Url) -> Self {
        Self { scheme: scheme.into(), catalog, storage_url }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The identifier that resolves back to `node`.
    pub fn identifier(&self, node: &Node) -> Result<String> {
        match (node, node.location()) {
            (Node::Detached(url, _), _) => Ok(url.to_string()),
            (_, Some(location)) => location.encode(&self.scheme),
            (_, None) => Location::Root.encode(&self.scheme),
        }
    }

    /// Resolve an identifier. Malformed identifiers, unknown ids and unknown
    /// filenames are all `None`.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, identifier: &str) -> Result<Option<Node>> {
        if let Some(node) = self.detached(identifier) {
            return Ok(Some(node));
        }
        match Location::decode(&self.scheme, identifier) {
            Ok(location) => self.resolve_location(&location).await,
            Err(err) => {
                tracing::debug!(error = ?err, "Not found");
                Ok(None)
            },
        }
    }

    /// Resolve a decoded location. Only group and track segments consult the
    /// catalog.
    pub async fn resolve_location(&self, location: &Location) -> Result<Option<Node>> {
        Ok(match location {
            Location::Root => Some(Node::Root),
            Location::Category(grouping) => Some(Node::Category(*grouping)),
            Location::Bucket(grouping, bucket) => Some(Node::Bucket(*grouping, *bucket)),
            Location::Group(grouping, bucket, group) => self
                .catalog
                .query_group(*grouping, group.id)
                .await
                .or_raise(|| ErrorKind::Catalog)?
                .map(|group| Node::Group(*grouping, *bucket, group)),
            Location::Track(grouping, bucket, group, filename) => {
                let Some(group) = self.catalog.query_group(*grouping, group.id).await.or_raise(|| ErrorKind::Catalog)?
                else {
                    tracing::debug!(id = group.id, "Unknown group");
                    return Ok(None);
                };
                let group = GroupRef::new(group.id, group.name);
                self.catalog
                    .find_track(*grouping, group.id, filename)
                    .await
                    .or_raise(|| ErrorKind::Catalog)?
                    .map(|track| Node::Track(*grouping, *bucket, group, track))
            },
        })
    }

    /// Storage URLs (`https://ftp.modland.com/pub/...`) become detached files.
    fn detached(&self, identifier: &str) -> Option<Node> {
        let url = Url::parse(identifier).ok()?;
        if !matches!(url.scheme(), "http" | "https")
            || url.host_str() != self.storage_url.host_str()
            || !url.path().starts_with("/pub/")
        {
            return None;
        }
        let path = percent_decode_str(url.path()).decode_utf8().ok()?.into_owned();
        if path.ends_with('/') {
            return None;
        }
        Some(Node::Detached(url, Track::new(path, 0)))
    }

    /// The parent of `node`, recomputed from its location. The root and
    /// detached files have none.
    pub async fn parent(&self, node: &Node) -> Result<Option<Node>> {
        let Some(parent) = node.location().and_then(|location| location.parent()) else {
            return Ok(None);
        };
        self.resolve_location(&parent).await
    }

    /// Children of a directory node: count hint first, then the nodes.
    ///
    /// `None` for files. Categories list `#` first, then `A` to `Z`.
    pub fn enumerate<'a>(&'a self, node: &Node) -> Option<Listing<'a, Node>> {
        Some(match node {
            Node::Root => from_items(Grouping::ALL.into_iter().map(Node::Category).collect()),
            Node::Category(grouping) => {
                let grouping = *grouping;
                from_items(Bucket::all().map(|bucket| Node::Bucket(grouping, bucket)).collect())
            },
            Node::Bucket(grouping, bucket) => {
                let (grouping, bucket) = (*grouping, *bucket);
                Box::pin(
                    self.catalog
                        .query_groups(grouping, bucket)
                        .map_ok(move |event| event.map(|group| Node::Group(grouping, bucket, group))),
                )
            },
            Node::Group(grouping, bucket, group) => {
                let (grouping, bucket) = (*grouping, *bucket);
                let group = GroupRef::new(group.id, group.name.clone());
                Box::pin(
                    self.catalog
                        .query_tracks(grouping, group.id)
                        .map_ok(move |event| event.map(|track| Node::Track(grouping, bucket, group.clone(), track))),
                )
            },
            Node::Track(..) | Node::Detached(..) => return None,
        })
    }

    /// Fetch the content of a file node.
    #[instrument(level = "debug", skip(self, node), fields(node = %node.name()))]
    pub async fn content(&self, node: &Node) -> Result<Content> {
        let Some(track) = node.track() else {
            exn::bail!(ErrorKind::NotAFile(node.name()));
        };
        self.catalog.track_content(&track.path).await.or_raise(|| ErrorKind::Catalog)
    }
}
