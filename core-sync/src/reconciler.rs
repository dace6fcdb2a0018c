//! # Reconciler
//!
//! Writes one upstream collection page into the local mirror.
//!
//! Every release of a page goes through the same ordered steps inside a
//! single transaction:
//!
//! 1. upsert the release row by id
//! 2. upsert referenced artists and labels, then rebuild the release's links
//! 3. delete and reinsert formats with their descriptions
//! 4. get-or-create genres and styles, then rebuild the release's links
//! 5. delete and reinsert notes
//!
//! Any failure rolls the whole page back.

use crate::{Result, SyncError};
use bridge_traits::time::Clock;
use core_library::models::{ArtistCredit, Format, LabelCredit, Note, ReleaseEntry};
use core_library::repositories::collection;
use provider_discogs::types::{CollectionPage, CollectionRelease, FormatResource};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct Reconciler {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl Reconciler {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Reconcile every release of `page` in one transaction
    ///
    /// Returns the number of releases written.
    ///
    /// # Errors
    ///
    /// `InvalidRecord` if a release carries a non-positive id (nothing is
    /// written), storage errors otherwise. Either way the page is rolled
    /// back.
    #[instrument(skip(self, page), fields(page = page.pagination.page, releases = page.releases.len()))]
    pub async fn save_page(&self, page: &CollectionPage) -> Result<usize> {
        if let Some(bad) = page.releases.iter().find(|r| r.id <= 0) {
            return Err(SyncError::InvalidRecord(format!(
                "release id {} in page {}",
                bad.id, page.pagination.page
            )));
        }

        let now = self.clock.unix_timestamp();
        let mut tx = self.pool.begin().await?;

        for release in &page.releases {
            save_release(&mut tx, release, now).await?;
        }

        tx.commit().await?;
        debug!(saved = page.releases.len(), "Page committed");
        Ok(page.releases.len())
    }
}

async fn save_release(
    conn: &mut SqliteConnection,
    release: &CollectionRelease,
    now: i64,
) -> Result<()> {
    let info = &release.basic_information;

    collection::upsert_release(&mut *conn, &release_entry(release), now).await?;

    let artists: Vec<ArtistCredit> = info
        .artists
        .iter()
        .map(|a| ArtistCredit {
            artist_id: a.id,
            name: a.name.clone(),
            resource_url: a.resource_url.clone(),
            join_relation: a.join.clone(),
            anv: a.anv.clone(),
            tracks: a.tracks.clone(),
            role: a.role.clone(),
        })
        .collect();
    for artist in &artists {
        collection::upsert_artist(&mut *conn, artist).await?;
    }

    let labels: Vec<LabelCredit> = info
        .labels
        .iter()
        .map(|l| LabelCredit {
            label_id: l.id,
            name: l.name.clone(),
            resource_url: l.resource_url.clone(),
            entity_type: l.entity_type.clone(),
            catno: l.catno.clone(),
        })
        .collect();
    for label in &labels {
        collection::upsert_label(&mut *conn, label).await?;
    }

    collection::replace_release_artists(&mut *conn, release.id, &artists).await?;
    collection::replace_release_labels(&mut *conn, release.id, &labels).await?;

    let formats: Vec<Format> = info
        .formats
        .iter()
        .map(|f| to_format(release.id, f))
        .collect();
    collection::replace_formats(&mut *conn, release.id, &formats).await?;

    collection::link_genres(&mut *conn, release.id, &info.genres).await?;
    collection::link_styles(&mut *conn, release.id, &info.styles).await?;

    let notes: Vec<Note> = release
        .notes
        .iter()
        .map(|n| Note {
            field_id: n.field_id,
            value: n.value.clone(),
        })
        .collect();
    collection::replace_notes(&mut *conn, release.id, &notes).await?;

    Ok(())
}

fn release_entry(release: &CollectionRelease) -> ReleaseEntry {
    let info = &release.basic_information;
    ReleaseEntry {
        id: release.id,
        instance_id: release.instance_id,
        folder_id: release.folder_id,
        rating: release.rating,
        title: info.title.clone(),
        year: (info.year > 0).then_some(info.year),
        resource_url: info.resource_url.clone(),
        thumb: info.thumb.clone(),
        cover_image: info.cover_image.clone(),
    }
}

fn to_format(release_id: i64, format: &FormatResource) -> Format {
    let qty = match format.qty.trim().parse::<i64>() {
        Ok(qty) => qty,
        Err(_) => {
            warn!(release_id, qty = %format.qty, "Unparseable format quantity, storing 1");
            1
        }
    };
    Format::new(format.name.clone(), qty).with_descriptions(format.descriptions.iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::SystemClock;
    use core_library::create_test_pool;
    use provider_discogs::types::Pagination;

    fn page(json: &str) -> CollectionPage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_year_zero_is_unset() {
        let page = page(
            r#"{"pagination": {"page": 1, "pages": 1},
                "releases": [{"id": 5, "basic_information": {"title": "X", "year": 0}}]}"#,
        );
        assert_eq!(release_entry(&page.releases[0]).year, None);
    }

    #[test]
    fn test_bad_quantity_defaults_to_one() {
        let format = FormatResource {
            name: "Vinyl".to_string(),
            qty: "two".to_string(),
            descriptions: vec!["LP".to_string()],
            text: None,
        };
        assert_eq!(to_format(1, &format).qty, 1);
    }

    #[tokio::test]
    async fn test_invalid_release_rejects_whole_page() {
        let pool = create_test_pool().await.unwrap();
        let reconciler = Reconciler::new(pool.clone(), Arc::new(SystemClock));

        let page = page(
            r#"{"pagination": {"page": 1, "pages": 1},
                "releases": [
                    {"id": 5, "basic_information": {"title": "Good"}},
                    {"id": 0, "basic_information": {"title": "Bad"}}
                ]}"#,
        );

        let result = reconciler.save_page(&page).await;
        assert!(matches!(result, Err(SyncError::InvalidRecord(_))));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM releases")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_empty_page_commits_nothing() {
        let pool = create_test_pool().await.unwrap();
        let reconciler = Reconciler::new(pool, Arc::new(SystemClock));
        let page = CollectionPage {
            pagination: Pagination {
                page: 1,
                pages: 0,
                per_page: 100,
                items: 0,
            },
            releases: Vec::new(),
        };

        assert_eq!(reconciler.save_page(&page).await.unwrap(), 0);
    }
}
