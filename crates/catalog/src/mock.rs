//! In-memory catalog and HTTP provider for testing.

use crate::error::{ErrorKind, Result};
use crate::http::{HttpProvider, HttpResponse};
use crate::listing::{ListEvent, Listing};
use crate::{Bucket, Catalog, Group, Grouping, Track};
use async_stream::try_stream;
use async_trait::async_trait;
use modvfs_io::Content;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use url::Url;

/// In-memory [`Catalog`].
///
/// Every operation counts as one call; [`set_failing`](Self::set_failing)
/// makes every operation fail with [`Unavailable`](ErrorKind::Unavailable).
///
/// # Examples
///
/// ```
/// use modvfs_catalog::{Catalog, Group, Grouping, Track, mock::MockCatalog};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> modvfs_catalog::error::Result<()> {
/// let catalog = MockCatalog::default().with_group(
///     Grouping::Authors,
///     Group::new(42, "Beispiel", 1),
///     vec![Track::new("/pub/modules/Protracker/Beispiel/track1.mod", 4)],
/// );
/// assert!(catalog.query_group(Grouping::Authors, 42).await?.is_some());
/// assert!(catalog.query_group(Grouping::Formats, 42).await?.is_none());
/// assert_eq!(catalog.calls(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockCatalog {
    groups: HashMap<Grouping, Vec<Group>>,
    tracks: HashMap<(Grouping, u32), Vec<Track>>,
    content: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
    content_fetches: AtomicUsize,
    failing: AtomicBool,
}

impl MockCatalog {
    /// Add a group and its tracks. The tracks' content is registered too.
    pub fn with_group(mut self, grouping: Grouping, group: Group, tracks: Vec<Track>) -> Self {
        for track in &tracks {
            self.content.entry(track.path.clone()).or_insert_with(|| track.filename.as_bytes().to_vec());
        }
        self.tracks.insert((grouping, group.id), tracks);
        self.groups.entry(grouping).or_default().push(group);
        self
    }

    pub fn with_content(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.content.insert(path.into(), data.into());
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of operations started, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of successful content fetches.
    pub fn content_fetches(&self) -> usize {
        self.content_fetches.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    fn query_groups<'a>(&'a self, grouping: Grouping, bucket: Bucket) -> Listing<'a, Group> {
        Box::pin(try_stream! {
            self.enter()?;
            let matching: Vec<Group> = self
                .groups
                .get(&grouping)
                .into_iter()
                .flatten()
                .filter(|group| bucket.contains(&group.name))
                .cloned()
                .collect();
            yield ListEvent::CountHint(matching.len() as u64);
            for group in matching {
                yield ListEvent::Item(group);
            }
        })
    }

    async fn query_group(&self, grouping: Grouping, id: u32) -> Result<Option<Group>> {
        self.enter()?;
        Ok(self.groups.get(&grouping).and_then(|groups| groups.iter().find(|group| group.id == id)).cloned())
    }

    fn query_tracks<'a>(&'a self, grouping: Grouping, id: u32) -> Listing<'a, Track> {
        Box::pin(try_stream! {
            self.enter()?;
            if let Some(tracks) = self.tracks.get(&(grouping, id)) {
                yield ListEvent::CountHint(tracks.len() as u64);
                for track in tracks {
                    yield ListEvent::Item(track.clone());
                }
            }
        })
    }

    async fn track_content(&self, path: &str) -> Result<Content> {
        self.enter()?;
        let Some(data) = self.content.get(path) else {
            exn::bail!(ErrorKind::Transport(format!("no content at {path}")));
        };
        self.content_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Content::from(data.clone()))
    }
}

/// In-memory [`HttpProvider`] serving canned responses keyed by URL.
#[derive(Default)]
pub struct MockProvider {
    responses: HashMap<String, (Vec<u8>, Option<u64>)>,
    requested: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`, declaring its real length.
    pub fn with_page(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        let size = Some(body.len() as u64);
        self.with_response(url, body, size)
    }

    /// Serve `body` at `url` with an arbitrary declared length.
    pub fn with_response(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>, size: Option<u64>) -> Self {
        self.responses.insert(url.into(), (body.into(), size));
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches attempted.
    pub fn requests(&self) -> usize {
        self.requested.lock().map(|requested| requested.len()).unwrap_or_default()
    }

    /// URLs fetched so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().map(|requested| requested.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HttpProvider for MockProvider {
    async fn fetch(&self, url: &Url) -> Result<HttpResponse> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(url.to_string());
        }
        if self.failing.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Transport(url.to_string()));
        }
        let Some((body, size)) = self.responses.get(url.as_str()) else {
            exn::bail!(ErrorKind::Transport(format!("404 Not Found: {url}")));
        };
        Ok(HttpResponse { size: *size, body: Box::new(Cursor::new(body.clone())) })
    }
}
