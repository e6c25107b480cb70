//! Repository over the persistent catalog index.
//!
//! Record sets (a bucket's groups, a group's tracks) are replaced as a whole
//! inside one transaction, together with their refresh timestamp. A reader
//! therefore sees either the previous set or the new one, and the timestamp
//! always describes the set it sits next to.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{GroupRow, Scope, TrackRow};
use exn::ResultExt;
use modvfs_catalog::{Bucket, Group, Grouping, Track};
use sqlx::{Sqlite, SqlitePool, Transaction};
use time::UtcDateTime;
use tracing::instrument;

/// Row count of one index table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatistics {
    pub name: String,
    pub rows: u64,
}

/// Summary of the index contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub tables: Vec<TableStatistics>,
    /// Size of the database in bytes (pages in use times page size).
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Refreshes
    // =========================================================================

    /// When `scope` was last replaced from the remote, if ever.
    pub async fn refreshed_at(&self, scope: &Scope) -> Result<Option<UtcDateTime>> {
        let row: Option<(i64,)> = sqlx::query_as(include_str!("../queries/get_refresh.sql"))
            .bind(scope.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(|(at,)| UtcDateTime::from_unix_timestamp(at).or_raise(|| ErrorKind::InvalidData("refresh time")))
            .transpose()
    }

    async fn mark_refreshed(tx: &mut Transaction<'_, Sqlite>, scope: &Scope, at: UtcDateTime) -> Result<()> {
        sqlx::query(include_str!("../queries/put_refresh.sql"))
            .bind(scope.to_string())
            .bind(at.unix_timestamp())
            .execute(&mut **tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Groups
    // =========================================================================

    async fn upsert_group(tx: &mut Transaction<'_, Sqlite>, grouping: Grouping, group: &Group) -> Result<()> {
        let row = GroupRow::from(group);
        sqlx::query(include_str!("../queries/upsert_group.sql"))
            .bind(grouping.key())
            .bind(row.id)
            .bind(row.name)
            .bind(row.tracks)
            .execute(&mut **tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Replace the listing of `bucket` with `groups` (in order) and record
    /// the refresh time.
    #[instrument(skip(self, groups), fields(count = groups.len()))]
    pub async fn replace_bucket(
        &self,
        grouping: Grouping,
        bucket: Bucket,
        groups: &[Group],
        at: UtcDateTime,
    ) -> Result<()> {
        let bucket_key = bucket.to_string();
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/delete_bucket.sql"))
            .bind(grouping.key())
            .bind(&bucket_key)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (position, group) in groups.iter().enumerate() {
            Self::upsert_group(&mut tx, grouping, group).await?;
            sqlx::query(include_str!("../queries/insert_bucket_group.sql"))
                .bind(grouping.key())
                .bind(&bucket_key)
                .bind(i64::try_from(position).or_raise(|| ErrorKind::InvalidData("position"))?)
                .bind(i64::from(group.id))
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Self::mark_refreshed(&mut tx, &Scope::Bucket(grouping, bucket), at).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Groups of `bucket` in listing order. Empty if never refreshed.
    pub async fn list_bucket(&self, grouping: Grouping, bucket: Bucket) -> Result<Vec<Group>> {
        let rows: Vec<GroupRow> = sqlx::query_as(include_str!("../queries/list_bucket.sql"))
            .bind(grouping.key())
            .bind(bucket.to_string())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Group::try_from).collect()
    }

    pub async fn get_group(&self, grouping: Grouping, id: u32) -> Result<Option<Group>> {
        let row: Option<GroupRow> = sqlx::query_as(include_str!("../queries/get_group.sql"))
            .bind(grouping.key())
            .bind(i64::from(id))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Group::try_from).transpose()
    }

    /// Record a single group without touching any bucket listing.
    pub async fn put_group(&self, grouping: Grouping, group: &Group) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Self::upsert_group(&mut tx, grouping, group).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Tracks
    // =========================================================================

    async fn upsert_track(tx: &mut Transaction<'_, Sqlite>, track: &Track) -> Result<()> {
        let row = TrackRow::try_from(track)?;
        sqlx::query(include_str!("../queries/upsert_track.sql"))
            .bind(row.path)
            .bind(row.filename)
            .bind(row.size)
            .execute(&mut **tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Replace the track listing of group `id` and record the refresh time.
    #[instrument(skip(self, tracks), fields(count = tracks.len()))]
    pub async fn replace_tracks(&self, grouping: Grouping, id: u32, tracks: &[Track], at: UtcDateTime) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/delete_group_tracks.sql"))
            .bind(grouping.key())
            .bind(i64::from(id))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (position, track) in tracks.iter().enumerate() {
            Self::upsert_track(&mut tx, track).await?;
            sqlx::query(include_str!("../queries/insert_group_track.sql"))
                .bind(grouping.key())
                .bind(i64::from(id))
                .bind(i64::try_from(position).or_raise(|| ErrorKind::InvalidData("position"))?)
                .bind(&track.path)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Self::mark_refreshed(&mut tx, &Scope::Tracks(grouping, id), at).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Tracks of group `id` in listing order. Empty if never refreshed.
    pub async fn list_tracks(&self, grouping: Grouping, id: u32) -> Result<Vec<Track>> {
        let rows: Vec<TrackRow> = sqlx::query_as(include_str!("../queries/list_tracks.sql"))
            .bind(grouping.key())
            .bind(i64::from(id))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Track::try_from).collect()
    }

    pub async fn find_track(&self, grouping: Grouping, id: u32, filename: &str) -> Result<Option<Track>> {
        let row: Option<TrackRow> = sqlx::query_as(include_str!("../queries/find_track.sql"))
            .bind(grouping.key())
            .bind(i64::from(id))
            .bind(filename)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Track::try_from).transpose()
    }

    /// Record a single track as a member of group `id`, appended after the
    /// tracks already known. The refresh time of the group is left alone.
    pub async fn put_track(&self, grouping: Grouping, id: u32, track: &Track) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Self::upsert_track(&mut tx, track).await?;
        sqlx::query(include_str!("../queries/link_track.sql"))
            .bind(grouping.key())
            .bind(i64::from(id))
            .bind(&track.path)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub async fn statistics(&self) -> Result<Statistics> {
        let names: Vec<(String,)> = sqlx::query_as(include_str!("../queries/list_tables.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut tables = Vec::with_capacity(names.len());
        for (name,) in names {
            // Table names come from sqlite_master, never from user input.
            let (rows,): (i64,) = sqlx::query_as(&format!(r#"SELECT COUNT(*) FROM "{name}""#))
                .fetch_one(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
            let rows = u64::try_from(rows).or_raise(|| ErrorKind::InvalidData("row count"))?;
            tables.push(TableStatistics { name, rows });
        }
        let (size,): (i64,) = sqlx::query_as(include_str!("../queries/database_size.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let size = u64::try_from(size).or_raise(|| ErrorKind::InvalidData("database size"))?;
        Ok(Statistics { tables, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    async fn repository() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    fn bucket_b() -> Bucket {
        Bucket::letter('B').unwrap()
    }

    fn track(group: &str, filename: &str) -> Track {
        Track::new(format!("/pub/modules/Protracker/{group}/{filename}"), 1024)
    }

    #[tokio::test]
    async fn test_never_refreshed_scope() {
        let repo = repository().await;
        let scope = Scope::Bucket(Grouping::Authors, bucket_b());
        assert_eq!(repo.refreshed_at(&scope).await.unwrap(), None);
        assert!(repo.list_bucket(Grouping::Authors, bucket_b()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_bucket_keeps_order_and_timestamp() {
        let repo = repository().await;
        let at = UtcDateTime::now().replace_nanosecond(0).unwrap();
        let groups = vec![Group::new(7, "Brother", 2), Group::new(42, "Beispiel", 3)];
        repo.replace_bucket(Grouping::Authors, bucket_b(), &groups, at).await.unwrap();

        assert_eq!(repo.list_bucket(Grouping::Authors, bucket_b()).await.unwrap(), groups);
        let scope = Scope::Bucket(Grouping::Authors, bucket_b());
        assert_eq!(repo.refreshed_at(&scope).await.unwrap(), Some(at));
        // Other groupings are unaffected.
        assert!(repo.list_bucket(Grouping::Formats, bucket_b()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_bucket_drops_vanished_groups() {
        let repo = repository().await;
        let at = UtcDateTime::now();
        let first = vec![Group::new(1, "Bar", 1), Group::new(2, "Baz", 1)];
        repo.replace_bucket(Grouping::Authors, bucket_b(), &first, at).await.unwrap();
        let second = vec![Group::new(2, "Baz", 4)];
        repo.replace_bucket(Grouping::Authors, bucket_b(), &second, at + Duration::hours(1)).await.unwrap();

        assert_eq!(repo.list_bucket(Grouping::Authors, bucket_b()).await.unwrap(), second);
        // The group record itself survives and is updated.
        assert_eq!(repo.get_group(Grouping::Authors, 2).await.unwrap(), Some(Group::new(2, "Baz", 4)));
        assert_eq!(repo.get_group(Grouping::Authors, 1).await.unwrap(), Some(Group::new(1, "Bar", 1)));
    }

    #[tokio::test]
    async fn test_group_ids_are_scoped_by_grouping() {
        let repo = repository().await;
        repo.put_group(Grouping::Authors, &Group::new(5, "Beispiel", 1)).await.unwrap();
        repo.put_group(Grouping::Formats, &Group::new(5, "Protracker", 900)).await.unwrap();
        assert_eq!(repo.get_group(Grouping::Authors, 5).await.unwrap().unwrap().name, "Beispiel");
        assert_eq!(repo.get_group(Grouping::Formats, 5).await.unwrap().unwrap().name, "Protracker");
        assert_eq!(repo.get_group(Grouping::Collections, 5).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_and_find_tracks() {
        let repo = repository().await;
        let tracks = vec![track("Beispiel", "track1.mod"), track("Beispiel", "track2.mod")];
        repo.replace_tracks(Grouping::Authors, 42, &tracks, UtcDateTime::now()).await.unwrap();

        assert_eq!(repo.list_tracks(Grouping::Authors, 42).await.unwrap(), tracks);
        let found = repo.find_track(Grouping::Authors, 42, "track2.mod").await.unwrap();
        assert_eq!(found, Some(tracks[1].clone()));
        assert_eq!(repo.find_track(Grouping::Authors, 42, "track3.mod").await.unwrap(), None);
        assert_eq!(repo.find_track(Grouping::Authors, 43, "track1.mod").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_track_appends_once() {
        let repo = repository().await;
        let first = track("Beispiel", "track1.mod");
        let second = track("Beispiel", "track2.mod");
        repo.put_track(Grouping::Authors, 42, &first).await.unwrap();
        repo.put_track(Grouping::Authors, 42, &second).await.unwrap();
        repo.put_track(Grouping::Authors, 42, &first).await.unwrap();

        assert_eq!(repo.list_tracks(Grouping::Authors, 42).await.unwrap(), vec![first, second]);
        assert_eq!(repo.refreshed_at(&Scope::Tracks(Grouping::Authors, 42)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_track_shared_between_groupings() {
        let repo = repository().await;
        let shared = track("Beispiel", "track1.mod");
        let at = UtcDateTime::now();
        repo.replace_tracks(Grouping::Authors, 42, std::slice::from_ref(&shared), at).await.unwrap();
        repo.replace_tracks(Grouping::Formats, 3, std::slice::from_ref(&shared), at).await.unwrap();
        repo.replace_tracks(Grouping::Authors, 42, &[], at).await.unwrap();

        assert!(repo.list_tracks(Grouping::Authors, 42).await.unwrap().is_empty());
        assert_eq!(repo.list_tracks(Grouping::Formats, 3).await.unwrap(), vec![shared]);
    }

    #[tokio::test]
    async fn test_statistics() {
        let repo = repository().await;
        let groups = vec![Group::new(1, "Bar", 1), Group::new(2, "Baz", 1)];
        repo.replace_bucket(Grouping::Authors, bucket_b(), &groups, UtcDateTime::now()).await.unwrap();

        let stats = repo.statistics().await.unwrap();
        let rows = |name: &str| stats.tables.iter().find(|t| t.name == name).map(|t| t.rows);
        assert_eq!(rows("groups"), Some(2));
        assert_eq!(rows("bucket_groups"), Some(2));
        assert_eq!(rows("refreshes"), Some(1));
        assert_eq!(rows("tracks"), Some(0));
        assert!(stats.tables.iter().all(|t| !t.name.starts_with("_sqlx")));
        assert!(stats.size > 0);
    }
}
