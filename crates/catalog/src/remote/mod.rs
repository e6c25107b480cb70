//! Catalog backed by remote listing pages.
//!
//! Listings are paginated HTML pages below a configurable base URL; content
//! is downloaded from the storage host. See [`parse`] for the page layout.

mod consts;
mod parse;

use crate::error::{ErrorKind, Result};
use crate::http::HttpHandle;
use crate::listing::{ListEvent, Listing};
use crate::{Bucket, Catalog, Group, Grouping, Track};
use async_stream::try_stream;
use async_trait::async_trait;
use exn::ResultExt;
use modvfs_io::{Content, Reader};
use parse::Page;
use tracing::instrument;
use url::Url;

/// Query modes: (bucket listing, group track listing).
fn modes(grouping: Grouping) -> (&'static str, &'static str) {
    match grouping {
        Grouping::Authors => ("b_aut", "aut"),
        Grouping::Collections => ("b_col", "col"),
        Grouping::Formats => ("b_fmt", "fmt"),
    }
}

/// Remote catalog client.
///
/// # Examples
///
/// ```no_run
/// # #[cfg(feature = "http")]
/// # async fn example() -> modvfs_catalog::error::Result<()> {
/// use modvfs_catalog::{Bucket, Catalog, Grouping, ListEvent, RemoteCatalog, http::ReqwestProvider};
/// use futures::TryStreamExt;
/// use std::sync::Arc;
/// use url::Url;
///
/// let catalog = RemoteCatalog::new(
///     Arc::new(ReqwestProvider::new()?),
///     Url::parse("https://www.exotica.org.uk/mediawiki/index.php?title=Special:Modland").unwrap(),
///     Url::parse("https://ftp.modland.com").unwrap(),
/// );
/// let mut groups = catalog.query_groups(Grouping::Authors, Bucket::of("Beispiel"));
/// while let Some(event) = groups.try_next().await? {
///     if let ListEvent::Item(group) = event {
///         println!("{} ({})", group.name, group.description());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RemoteCatalog {
    http: HttpHandle,
    catalog_url: Url,
    storage_url: Url,
    reader: Reader,
}

impl RemoteCatalog {
    pub fn new(http: HttpHandle, catalog_url: Url, storage_url: Url) -> Self {
        Self { http, catalog_url, storage_url, reader: Reader::default() }
    }

    pub fn with_reader(mut self, reader: Reader) -> Self {
        self.reader = reader;
        self
    }

    /// Download URL of a decoded track path. Each segment is re-encoded on
    /// its own, so a literal `%` in a filename stays part of the name.
    pub fn storage_location(&self, path: &str) -> Url {
        let mut url = self.storage_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.clear().extend(path.trim_start_matches('/').split('/'));
        }
        url
    }

    fn page_url(&self, params: &[(&str, &str)], page: u32) -> Url {
        let mut url = self.catalog_url.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("pg", &page.to_string());
        }
        url
    }

    fn groups_url(&self, grouping: Grouping, bucket: Bucket, page: u32) -> Url {
        let (mode, _) = modes(grouping);
        self.page_url(&[("md", mode), ("st", &bucket.to_string())], page)
    }

    fn tracks_url(&self, grouping: Grouping, id: u32, page: u32) -> Url {
        let (_, mode) = modes(grouping);
        self.page_url(&[("md", mode), ("id", &id.to_string())], page)
    }

    async fn download(&self, url: &Url) -> Result<Content> {
        let response = self.http.fetch(url).await?;
        let reader = self.reader.clone();
        let location = url.to_string();
        tokio::task::spawn_blocking(move || match response.size {
            Some(size) => reader.read_stream_sized(response.body, size),
            None => reader.read_stream(response.body),
        })
        .await
        .or_raise(|| ErrorKind::Transport(location.clone()))?
        .or_raise(|| ErrorKind::Content(location))
    }

    async fn fetch_page(&self, url: &Url) -> Result<String> {
        let content = self.download(url).await?;
        Ok(String::from_utf8_lossy(&content).into_owned())
    }

    /// Follow `next` links from page 1, hinting with the first page's count.
    fn paginate<'a, T, U, P>(&'a self, url: U, parse: P) -> Listing<'a, T>
    where
        T: Send + 'a,
        U: Fn(u32) -> Url + Send + 'a,
        P: Fn(&str) -> Result<Page<T>> + Send + 'a,
    {
        Box::pin(try_stream! {
            let mut number = 1;
            loop {
                let page_url = url(number);
                let html = self.fetch_page(&page_url).await?;
                let page = parse(&html)?;
                tracing::debug!(url = %page_url, items = page.items.len(), "Fetched listing page");
                if number == 1 {
                    if let Some(count) = page.count {
                        yield ListEvent::CountHint(count);
                    }
                }
                let empty = page.items.is_empty();
                for item in page.items {
                    yield ListEvent::Item(item);
                }
                if empty || !page.has_next {
                    break;
                }
                number += 1;
            }
        })
    }
}

#[async_trait]
impl Catalog for RemoteCatalog {
    fn query_groups<'a>(&'a self, grouping: Grouping, bucket: Bucket) -> Listing<'a, Group> {
        tracing::debug!(%grouping, %bucket, "Querying remote groups");
        self.paginate(move |page| self.groups_url(grouping, bucket, page), parse::groups_page)
    }

    #[instrument(level = "debug", skip(self))]
    async fn query_group(&self, grouping: Grouping, id: u32) -> Result<Option<Group>> {
        let html = self.fetch_page(&self.tracks_url(grouping, id, 1)).await?;
        let page = parse::tracks_page(&html, &self.storage_url)?;
        let Some(name) = page.heading else {
            tracing::debug!("Unknown group");
            return Ok(None);
        };
        let tracks = page.count.unwrap_or(page.items.len() as u64);
        Ok(Some(Group { id, name, tracks: u32::try_from(tracks).unwrap_or(u32::MAX) }))
    }

    fn query_tracks<'a>(&'a self, grouping: Grouping, id: u32) -> Listing<'a, Track> {
        tracing::debug!(%grouping, id, "Querying remote tracks");
        let base = self.storage_url.clone();
        self.paginate(move |page| self.tracks_url(grouping, id, page), move |html| parse::tracks_page(html, &base))
    }

    #[instrument(level = "debug", skip(self))]
    async fn track_content(&self, path: &str) -> Result<Content> {
        let content = self.download(&self.storage_location(path)).await?;
        tracing::info!(bytes = content.len(), "Downloaded track");
        Ok(content)
    }
}
