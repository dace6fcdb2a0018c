//! Release repository trait and implementation
//!
//! Read access for the collection view plus the duration backfill writes.
//! Page-level writes go through [`super::collection`].

use crate::error::{LibraryError, Result};
use crate::models::{Format, Release, Track};
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

const RELEASE_COLUMNS: &str = "id, instance_id, folder_id, rating, title, year, resource_url, \
     thumb, cover_image, play_duration, play_duration_estimated, created_at, updated_at";

/// Release repository interface
#[async_trait]
pub trait ReleaseRepository: Send + Sync {
    /// Find a release by its upstream id
    async fn find_by_id(&self, id: i64) -> Result<Option<Release>>;

    /// Releases ordered by title, optionally restricted to one folder
    async fn list_releases(
        &self,
        folder_id: Option<i64>,
        page_request: PageRequest,
    ) -> Result<Page<Release>>;

    /// Count stored releases
    async fn count(&self) -> Result<i64>;

    /// Formats of a release with their descriptions, in insertion order
    async fn get_formats(&self, release_id: i64) -> Result<Vec<Format>>;

    /// Tracks of a release ordered by position
    async fn get_tracks(&self, release_id: i64) -> Result<Vec<Track>>;

    /// Releases whose duration has never been resolved, in random order
    async fn get_missing_duration(&self) -> Result<Vec<Release>>;

    /// Replace every track of a release in one transaction
    async fn replace_tracks(&self, release_id: i64, tracks: &[Track]) -> Result<()>;

    /// Record a resolved duration and whether it was estimated
    ///
    /// # Errors
    /// Returns `NotFound` if the release does not exist
    async fn update_duration(
        &self,
        release_id: i64,
        seconds: i64,
        estimated: bool,
        now: i64,
    ) -> Result<()>;
}

/// SQLite implementation of ReleaseRepository
pub struct SqliteReleaseRepository {
    pool: SqlitePool,
}

impl SqliteReleaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReleaseRepository for SqliteReleaseRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Release>> {
        let sql = format!("SELECT {} FROM releases WHERE id = ?", RELEASE_COLUMNS);
        let release = sqlx::query_as::<_, Release>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(release)
    }

    async fn list_releases(
        &self,
        folder_id: Option<i64>,
        page_request: PageRequest,
    ) -> Result<Page<Release>> {
        // `?1 IS NULL` lets one statement serve both the filtered and the full listing.
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM releases WHERE (?1 IS NULL OR folder_id = ?1)")
                .bind(folder_id)
                .fetch_one(&self.pool)
                .await?;

        let sql = format!(
            "SELECT {} FROM releases WHERE (?1 IS NULL OR folder_id = ?1) \
             ORDER BY title COLLATE NOCASE, id LIMIT ?2 OFFSET ?3",
            RELEASE_COLUMNS
        );
        let items = sqlx::query_as::<_, Release>(&sql)
            .bind(folder_id)
            .bind(page_request.limit())
            .bind(page_request.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total.max(0) as u64, page_request))
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM releases")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_formats(&self, release_id: i64) -> Result<Vec<Format>> {
        let rows: Vec<(i64, String, i64, Option<String>)> = sqlx::query_as(
            r#"
            SELECT f.id, f.name, f.qty, d.description
            FROM formats f
            LEFT JOIN format_descriptions d ON d.format_id = f.id
            WHERE f.release_id = ?
            ORDER BY f.id, d.rowid
            "#,
        )
        .bind(release_id)
        .fetch_all(&self.pool)
        .await?;

        let mut formats: Vec<(i64, Format)> = Vec::new();
        for (format_id, name, qty, description) in rows {
            let is_new = formats.last().map(|(id, _)| *id) != Some(format_id);
            if is_new {
                formats.push((format_id, Format::new(name, qty)));
            }
            if let (Some(description), Some((_, format))) = (description, formats.last_mut()) {
                format.descriptions.push(description);
            }
        }

        Ok(formats.into_iter().map(|(_, format)| format).collect())
    }

    async fn get_tracks(&self, release_id: i64) -> Result<Vec<Track>> {
        let tracks = sqlx::query_as::<_, Track>(
            r#"
            SELECT release_id, position, title, duration_text, duration_seconds
            FROM tracks
            WHERE release_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(release_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tracks)
    }

    async fn get_missing_duration(&self) -> Result<Vec<Release>> {
        let sql = format!(
            "SELECT {} FROM releases WHERE play_duration IS NULL ORDER BY RANDOM()",
            RELEASE_COLUMNS
        );
        let releases = sqlx::query_as::<_, Release>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(releases)
    }

    async fn replace_tracks(&self, release_id: i64, tracks: &[Track]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tracks WHERE release_id = ?")
            .bind(release_id)
            .execute(&mut *tx)
            .await?;

        for track in tracks {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO tracks (
                    release_id, position, title, duration_text, duration_seconds
                )
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(release_id)
            .bind(&track.position)
            .bind(&track.title)
            .bind(&track.duration_text)
            .bind(track.duration_seconds)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(release_id, tracks = tracks.len(), "Replaced tracks");
        Ok(())
    }

    async fn update_duration(
        &self,
        release_id: i64,
        seconds: i64,
        estimated: bool,
        now: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE releases
            SET play_duration = ?, play_duration_estimated = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(seconds)
        .bind(estimated)
        .bind(now)
        .bind(release_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Release".to_string(),
                id: release_id.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::ReleaseEntry;
    use crate::repositories::collection;

    async fn seed(pool: &SqlitePool, id: i64, title: &str, folder_id: i64) {
        let mut conn = pool.acquire().await.unwrap();
        let entry = ReleaseEntry {
            id,
            instance_id: id + 1000,
            folder_id,
            rating: 3,
            title: title.to_string(),
            year: None,
            resource_url: format!("https://api.test/releases/{}", id),
            thumb: String::new(),
            cover_image: String::new(),
        };
        collection::upsert_release(&mut conn, &entry, 100).await.unwrap();
    }

    fn track(release_id: i64, position: &str, duration: &str, seconds: i64) -> Track {
        Track {
            release_id,
            position: position.to_string(),
            title: format!("Track {}", position),
            duration_text: duration.to_string(),
            duration_seconds: seconds,
        }
    }

    #[tokio::test]
    async fn test_list_releases_by_folder() {
        let pool = create_test_pool().await.unwrap();
        seed(&pool, 1, "Blue", 1).await;
        seed(&pool, 2, "abbey Road", 1).await;
        seed(&pool, 3, "Court and Spark", 2).await;
        let repo = SqliteReleaseRepository::new(pool);

        let all = repo.list_releases(None, PageRequest::default()).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.items[0].title, "abbey Road");

        let folder = repo
            .list_releases(Some(1), PageRequest::new(0, 1))
            .await
            .unwrap();
        assert_eq!(folder.total, 2);
        assert_eq!(folder.items.len(), 1);
        assert!(folder.has_next());
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_duration_until_updated() {
        let pool = create_test_pool().await.unwrap();
        seed(&pool, 1, "Blue", 1).await;
        seed(&pool, 2, "Hejira", 1).await;
        let repo = SqliteReleaseRepository::new(pool);

        assert_eq!(repo.get_missing_duration().await.unwrap().len(), 2);

        repo.update_duration(1, 2150, false, 200).await.unwrap();
        let missing = repo.get_missing_duration().await.unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, 2);

        let resolved = repo.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(resolved.play_duration, Some(2150));
        assert!(!resolved.play_duration_estimated);
    }

    #[tokio::test]
    async fn test_update_duration_unknown_release() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteReleaseRepository::new(pool);

        let result = repo.update_duration(404, 60, true, 1).await;
        assert!(matches!(result, Err(LibraryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_replace_tracks_wholesale() {
        let pool = create_test_pool().await.unwrap();
        seed(&pool, 5, "Pink Moon", 1).await;
        let repo = SqliteReleaseRepository::new(pool);

        repo.replace_tracks(5, &[track(5, "A1", "2:04", 124), track(5, "A2", "", 0)])
            .await
            .unwrap();
        repo.replace_tracks(5, &[track(5, "1", "3:00", 180)])
            .await
            .unwrap();

        let tracks = repo.get_tracks(5).await.unwrap();
        assert_eq!(tracks, vec![track(5, "1", "3:00", 180)]);
    }

    #[tokio::test]
    async fn test_get_formats_groups_descriptions() {
        let pool = create_test_pool().await.unwrap();
        seed(&pool, 8, "Tago Mago", 1).await;
        {
            let mut conn = pool.acquire().await.unwrap();
            collection::replace_formats(
                &mut conn,
                8,
                &[
                    Format::new("Vinyl", 2).with_descriptions(["LP", "Album"]),
                    Format::new("All Media", 1),
                ],
            )
            .await
            .unwrap();
        }
        let repo = SqliteReleaseRepository::new(pool);

        let formats = repo.get_formats(8).await.unwrap();
        assert_eq!(
            formats,
            vec![
                Format::new("Vinyl", 2).with_descriptions(["LP", "Album"]),
                Format::new("All Media", 1),
            ]
        );
    }
}
