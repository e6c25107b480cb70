//! Read-through caching in front of a remote [`Catalog`].

use crate::locks::KeyedLocks;
use crate::models::Scope;
use crate::repo::Repository;
use async_stream::try_stream;
use async_trait::async_trait;
use exn::ResultExt;
use modvfs_catalog::error::{Error, ErrorKind, Result};
use modvfs_catalog::{Bucket, Catalog, CatalogHandle, Content, Group, Grouping, ListEvent, Listing, Track, collect};
use modvfs_storage::error::ErrorKind as StorageErrorKind;
use modvfs_storage::{BackendHandle, validate_path};
use std::time::Duration;
use time::UtcDateTime;
use tracing::instrument;

/// How long refreshed record sets are trusted, and what happens when the
/// remote fails after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    /// Serve an expired set when the remote cannot be reached.
    pub serve_stale: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(24 * 60 * 60), serve_stale: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    Fresh,
    Stale,
    Missing,
}

impl CachePolicy {
    fn freshness(&self, refreshed_at: Option<UtcDateTime>, now: UtcDateTime) -> Freshness {
        match refreshed_at {
            None => Freshness::Missing,
            Some(at) if (now - at) < self.ttl => Freshness::Fresh,
            Some(_) => Freshness::Stale,
        }
    }
}

/// A [`Catalog`] that answers from the persistent index and content cache,
/// going to the remote catalog only for missing or expired data.
///
/// - Bucket and track listings are replaced as whole sets; an expired set is
///   kept and served if the remote fails (when the policy allows it).
/// - Single group and track lookups hit the index first and record remote
///   answers.
/// - Content is written to the content cache after the first fetch. Failing
///   to write it is logged; the fetched content is still returned.
pub struct CachingCatalog {
    remote: CatalogHandle,
    index: Repository,
    content: BackendHandle,
    policy: CachePolicy,
    locks: KeyedLocks,
}

impl CachingCatalog {
    pub fn new(remote: CatalogHandle, index: Repository, content: BackendHandle) -> Self {
        Self { remote, index, content, policy: CachePolicy::default(), locks: KeyedLocks::default() }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    async fn freshness(&self, scope: &Scope) -> Result<Freshness> {
        let refreshed_at = self.index.refreshed_at(scope).await.or_raise(|| ErrorKind::Index)?;
        Ok(self.policy.freshness(refreshed_at, UtcDateTime::now()))
    }

    /// Decide whether a failed refresh may fall back to the indexed set.
    fn fallback(&self, scope: &Scope, freshness: Freshness, err: Error) -> Result<()> {
        if freshness == Freshness::Stale && self.policy.serve_stale {
            tracing::warn!(%scope, error = ?err, "Remote refresh failed, serving stale entries");
            return Ok(());
        }
        Err(err)
    }

    #[instrument(level = "debug", skip(self))]
    async fn groups(&self, grouping: Grouping, bucket: Bucket) -> Result<Vec<Group>> {
        let scope = Scope::Bucket(grouping, bucket);
        if self.freshness(&scope).await? == Freshness::Fresh {
            tracing::debug!(%scope, "Index hit");
            return self.index.list_bucket(grouping, bucket).await.or_raise(|| ErrorKind::Index);
        }
        let _guard = self.locks.lock(scope.to_string()).await;
        // Another task may have refreshed the set while we waited.
        let freshness = self.freshness(&scope).await?;
        if freshness != Freshness::Fresh {
            tracing::debug!(%scope, ?freshness, "Index miss");
            match collect(self.remote.query_groups(grouping, bucket)).await {
                Ok((_, groups)) => {
                    self.index
                        .replace_bucket(grouping, bucket, &groups, UtcDateTime::now())
                        .await
                        .or_raise(|| ErrorKind::Index)?;
                    tracing::info!(%scope, count = groups.len(), "Refreshed groups from remote");
                    return Ok(groups);
                },
                Err(err) => self.fallback(&scope, freshness, err)?,
            }
        }
        self.index.list_bucket(grouping, bucket).await.or_raise(|| ErrorKind::Index)
    }

    #[instrument(level = "debug", skip(self))]
    async fn tracks(&self, grouping: Grouping, id: u32) -> Result<Vec<Track>> {
        let scope = Scope::Tracks(grouping, id);
        if self.freshness(&scope).await? == Freshness::Fresh {
            tracing::debug!(%scope, "Index hit");
            return self.index.list_tracks(grouping, id).await.or_raise(|| ErrorKind::Index);
        }
        let _guard = self.locks.lock(scope.to_string()).await;
        let freshness = self.freshness(&scope).await?;
        if freshness != Freshness::Fresh {
            tracing::debug!(%scope, ?freshness, "Index miss");
            match collect(self.remote.query_tracks(grouping, id)).await {
                Ok((_, tracks)) => {
                    self.index
                        .replace_tracks(grouping, id, &tracks, UtcDateTime::now())
                        .await
                        .or_raise(|| ErrorKind::Index)?;
                    tracing::info!(%scope, count = tracks.len(), "Refreshed tracks from remote");
                    return Ok(tracks);
                },
                Err(err) => self.fallback(&scope, freshness, err)?,
            }
        }
        self.index.list_tracks(grouping, id).await.or_raise(|| ErrorKind::Index)
    }

    /// Cached content at `key`, or `None` if it has to be fetched.
    async fn cached_content(&self, key: &std::path::Path) -> Option<Content> {
        match self.content.read(key).await {
            Ok(content) => Some(content),
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => None,
            Err(err) => {
                tracing::warn!(path = %key.display(), error = ?err, "Ignoring unreadable cached content");
                None
            },
        }
    }
}

#[async_trait]
impl Catalog for CachingCatalog {
    fn query_groups<'a>(&'a self, grouping: Grouping, bucket: Bucket) -> Listing<'a, Group> {
        Box::pin(try_stream! {
            let groups = self.groups(grouping, bucket).await?;
            yield ListEvent::CountHint(groups.len() as u64);
            for group in groups {
                yield ListEvent::Item(group);
            }
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn query_group(&self, grouping: Grouping, id: u32) -> Result<Option<Group>> {
        if let Some(group) = self.index.get_group(grouping, id).await.or_raise(|| ErrorKind::Index)? {
            tracing::debug!("Index hit");
            return Ok(Some(group));
        }
        let Some(group) = self.remote.query_group(grouping, id).await? else {
            tracing::debug!("Unknown group");
            return Ok(None);
        };
        self.index.put_group(grouping, &group).await.or_raise(|| ErrorKind::Index)?;
        Ok(Some(group))
    }

    fn query_tracks<'a>(&'a self, grouping: Grouping, id: u32) -> Listing<'a, Track> {
        Box::pin(try_stream! {
            let tracks = self.tracks(grouping, id).await?;
            yield ListEvent::CountHint(tracks.len() as u64);
            for track in tracks {
                yield ListEvent::Item(track);
            }
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn find_track(&self, grouping: Grouping, id: u32, filename: &str) -> Result<Option<Track>> {
        if let Some(track) = self.index.find_track(grouping, id, filename).await.or_raise(|| ErrorKind::Index)? {
            tracing::debug!("Index hit");
            return Ok(Some(track));
        }
        let Some(track) = self.remote.find_track(grouping, id, filename).await? else {
            tracing::debug!("Unknown track");
            return Ok(None);
        };
        self.index.put_track(grouping, id, &track).await.or_raise(|| ErrorKind::Index)?;
        Ok(Some(track))
    }

    #[instrument(level = "debug", skip(self))]
    async fn track_content(&self, path: &str) -> Result<Content> {
        let key = validate_path(path).or_raise(|| ErrorKind::Storage)?;
        if let Some(content) = self.cached_content(&key).await {
            tracing::debug!("Content cache hit");
            return Ok(content);
        }
        let _guard = self.locks.lock(format!("content:{}", key.display())).await;
        if let Ok(content) = self.content.read(&key).await {
            return Ok(content);
        }
        let content = self.remote.track_content(path).await?;
        match self.content.write(&key, &content).await {
            Ok(()) => tracing::info!(bytes = content.len(), backend = self.content.name(), "Cached content"),
            Err(err) => tracing::warn!(error = ?err, "Could not write content cache"),
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use futures::TryStreamExt;
    use modvfs_catalog::mock::MockCatalog;
    use modvfs_catalog::visit;
    use modvfs_storage::backend::MockBackend;
    use std::ops::ControlFlow;
    use std::sync::Arc;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    struct Fixture {
        remote: Arc<MockCatalog>,
        backend: Arc<MockBackend>,
        catalog: CachingCatalog,
    }

    fn tracks() -> Vec<Track> {
        vec![
            Track::new("/pub/modules/Protracker/Beispiel/track1.mod", 8),
            Track::new("/pub/modules/Protracker/Beispiel/track2.mod", 8),
        ]
    }

    async fn fixture(policy: CachePolicy) -> Fixture {
        fixture_with(policy, MockBackend::default()).await
    }

    async fn fixture_with(policy: CachePolicy, backend: MockBackend) -> Fixture {
        let remote = Arc::new(
            MockCatalog::default()
                .with_group(Grouping::Authors, Group::new(42, "Beispiel", 2), tracks())
                .with_group(Grouping::Authors, Group::new(7, "Brother", 0), vec![])
                .with_group(Grouping::Authors, Group::new(9, "Anders", 0), vec![]),
        );
        let backend = Arc::new(backend);
        let db = Database::connect_in_memory().await.unwrap();
        let catalog = CachingCatalog::new(remote.clone(), Repository::from(&db), backend.clone()).with_policy(policy);
        Fixture { remote, backend, catalog }
    }

    fn bucket_b() -> Bucket {
        Bucket::letter('B').unwrap()
    }

    async fn groups(catalog: &CachingCatalog) -> Result<(Option<u64>, Vec<Group>)> {
        collect(catalog.query_groups(Grouping::Authors, bucket_b())).await
    }

    #[tokio::test]
    async fn test_fresh_set_skips_remote() {
        let f = fixture(CachePolicy { ttl: HOUR, serve_stale: true }).await;
        let (hint, first) = groups(&f.catalog).await.unwrap();
        assert_eq!(hint, Some(2));
        assert_eq!(first.iter().map(|g| g.id).collect::<Vec<_>>(), vec![42, 7]);
        assert_eq!(f.remote.calls(), 1);

        let (_, second) = groups(&f.catalog).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_hint_precedes_items() {
        let f = fixture(CachePolicy::default()).await;
        let mut listing = f.catalog.query_groups(Grouping::Authors, bucket_b());
        assert_eq!(listing.try_next().await.unwrap(), Some(ListEvent::CountHint(2)));
        assert!(matches!(listing.try_next().await.unwrap(), Some(ListEvent::Item(_))));
    }

    #[tokio::test]
    async fn test_expired_set_is_refreshed() {
        let f = fixture(CachePolicy { ttl: Duration::ZERO, serve_stale: true }).await;
        groups(&f.catalog).await.unwrap();
        groups(&f.catalog).await.unwrap();
        assert_eq!(f.remote.calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_set_served_on_failure() {
        let f = fixture(CachePolicy { ttl: Duration::ZERO, serve_stale: true }).await;
        let (_, fresh) = groups(&f.catalog).await.unwrap();
        f.remote.set_failing(true);
        let (hint, stale) = groups(&f.catalog).await.unwrap();
        assert_eq!(stale, fresh);
        assert_eq!(hint, Some(2));
        assert_eq!(f.remote.calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_tracks_served_on_failure() {
        let f = fixture(CachePolicy { ttl: Duration::ZERO, serve_stale: true }).await;
        let (_, fresh) = collect(f.catalog.query_tracks(Grouping::Authors, 42)).await.unwrap();
        assert_eq!(fresh, tracks());
        f.remote.set_failing(true);
        let (hint, stale) = collect(f.catalog.query_tracks(Grouping::Authors, 42)).await.unwrap();
        assert_eq!(stale, fresh);
        assert_eq!(hint, Some(2));
        assert_eq!(f.remote.calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_fallback_can_be_disabled() {
        let f = fixture(CachePolicy { ttl: Duration::ZERO, serve_stale: false }).await;
        groups(&f.catalog).await.unwrap();
        f.remote.set_failing(true);
        let err = groups(&f.catalog).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_failure_without_cached_set_propagates() {
        let f = fixture(CachePolicy::default()).await;
        f.remote.set_failing(true);
        let err = groups(&f.catalog).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_hit_remote_once() {
        let f = fixture(CachePolicy::default()).await;
        let (a, b) = tokio::join!(groups(&f.catalog), groups(&f.catalog));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(f.remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_tracks_after_first() {
        let f = fixture(CachePolicy::default()).await;
        let mut seen = Vec::new();
        let finished = visit(f.catalog.query_tracks(Grouping::Authors, 42), |event| {
            match event {
                ListEvent::CountHint(_) => ControlFlow::Continue(()),
                ListEvent::Item(track) => {
                    seen.push(track);
                    ControlFlow::Break(())
                },
            }
        })
        .await
        .unwrap();
        assert!(!finished);
        assert_eq!(seen, vec![tracks()[0].clone()]);
    }

    #[tokio::test]
    async fn test_group_lookup_is_cached() {
        let f = fixture(CachePolicy::default()).await;
        let group = f.catalog.query_group(Grouping::Authors, 42).await.unwrap();
        assert_eq!(group, Some(Group::new(42, "Beispiel", 2)));
        f.remote.set_failing(true);
        assert_eq!(f.catalog.query_group(Grouping::Authors, 42).await.unwrap(), group);
        assert_eq!(f.remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_group_is_none() {
        let f = fixture(CachePolicy::default()).await;
        assert_eq!(f.catalog.query_group(Grouping::Authors, 1000).await.unwrap(), None);
        assert_eq!(f.catalog.query_group(Grouping::Formats, 42).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_track_is_cached() {
        let f = fixture(CachePolicy::default()).await;
        let track = f.catalog.find_track(Grouping::Authors, 42, "track2.mod").await.unwrap();
        assert_eq!(track, Some(tracks()[1].clone()));
        let calls = f.remote.calls();
        f.remote.set_failing(true);
        assert_eq!(f.catalog.find_track(Grouping::Authors, 42, "track2.mod").await.unwrap(), track);
        assert_eq!(f.remote.calls(), calls);
        // A different group never matches.
        f.remote.set_failing(false);
        assert_eq!(f.catalog.find_track(Grouping::Authors, 7, "track2.mod").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_content_fetched_once() {
        let f = fixture(CachePolicy::default()).await;
        let path = "/pub/modules/Protracker/Beispiel/track1.mod";
        let first = f.catalog.track_content(path).await.unwrap();
        let second = f.catalog.track_content(path).await.unwrap();
        assert_eq!(&*first, b"track1.mod");
        assert_eq!(first, second);
        assert_eq!(f.remote.content_fetches(), 1);
        assert_eq!(f.backend.writes(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_content_fetched_once() {
        let f = fixture(CachePolicy::default()).await;
        let catalog = Arc::new(f.catalog);
        let path = "/pub/modules/Protracker/Beispiel/track1.mod";
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let catalog = catalog.clone();
                tokio::spawn(async move { catalog.track_content(path).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(&*task.await.unwrap().unwrap(), b"track1.mod");
        }
        assert_eq!(f.remote.content_fetches(), 1);
        assert_eq!(f.backend.writes(), 1);
    }

    #[tokio::test]
    async fn test_content_write_failure_still_returns_content() {
        let f = fixture(CachePolicy::default()).await;
        f.backend.set_failing_writes(true);
        let path = "/pub/modules/Protracker/Beispiel/track2.mod";
        assert_eq!(&*f.catalog.track_content(path).await.unwrap(), b"track2.mod");
        assert_eq!(&*f.catalog.track_content(path).await.unwrap(), b"track2.mod");
        assert_eq!(f.remote.content_fetches(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_cached_content_is_replaced() {
        let backend = MockBackend::with_files([("pub/modules/Protracker/Beispiel/track1.mod", b"".as_slice())]);
        let f = fixture_with(CachePolicy::default(), backend).await;
        let content = f.catalog.track_content("/pub/modules/Protracker/Beispiel/track1.mod").await.unwrap();
        assert_eq!(&*content, b"track1.mod");
        assert_eq!(f.backend.writes(), 1);
    }

    #[tokio::test]
    async fn test_content_path_must_stay_inside_cache() {
        let f = fixture(CachePolicy::default()).await;
        let err = f.catalog.track_content("/../../etc/passwd").await.unwrap_err();
        assert_eq!(*err, ErrorKind::Storage);
        assert_eq!(f.remote.calls(), 0);
    }
}
