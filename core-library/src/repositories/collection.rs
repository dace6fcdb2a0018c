//! Transaction-scoped writers for collection pages
//!
//! Every function borrows a connection instead of the pool so that a caller
//! can run all writes for one page inside a single transaction:
//!
//! ```rust,ignore
//! let mut tx = pool.begin().await?;
//! collection::upsert_release(&mut tx, &entry, now).await?;
//! collection::replace_formats(&mut tx, entry.id, &formats).await?;
//! tx.commit().await?;
//! ```
//!
//! Natural-key entities (releases, artists, labels) are updated in place.
//! Link and child rows are deleted and reinserted, the incoming page being
//! authoritative for them.

use crate::error::{LibraryError, Result};
use crate::models::{ArtistCredit, Format, LabelCredit, Note, ReleaseEntry};
use sqlx::SqliteConnection;

/// Name-keyed tag vocabularies attached to releases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Genre,
    Style,
}

impl TagKind {
    fn table(&self) -> &'static str {
        match self {
            TagKind::Genre => "genres",
            TagKind::Style => "styles",
        }
    }

    fn link_table(&self) -> &'static str {
        match self {
            TagKind::Genre => "release_genres",
            TagKind::Style => "release_styles",
        }
    }

    fn link_column(&self) -> &'static str {
        match self {
            TagKind::Genre => "genre_id",
            TagKind::Style => "style_id",
        }
    }
}

/// Insert or update a release by id
///
/// Only the fields carried by a collection page are written. Duration
/// fields and `created_at` are left alone on update.
pub async fn upsert_release(
    conn: &mut SqliteConnection,
    release: &ReleaseEntry,
    now: i64,
) -> Result<()> {
    release
        .validate()
        .map_err(|message| LibraryError::InvalidInput {
            field: "Release".to_string(),
            message,
        })?;

    sqlx::query(
        r#"
        INSERT INTO releases (
            id, instance_id, folder_id, rating, title, year, resource_url, thumb,
            cover_image, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            instance_id = excluded.instance_id,
            folder_id = excluded.folder_id,
            rating = excluded.rating,
            title = excluded.title,
            year = excluded.year,
            resource_url = excluded.resource_url,
            thumb = excluded.thumb,
            cover_image = excluded.cover_image,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(release.id)
    .bind(release.instance_id)
    .bind(release.folder_id)
    .bind(release.rating)
    .bind(&release.title)
    .bind(release.year)
    .bind(&release.resource_url)
    .bind(&release.thumb)
    .bind(&release.cover_image)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn upsert_artist(conn: &mut SqliteConnection, artist: &ArtistCredit) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO artists (id, name, resource_url)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            resource_url = excluded.resource_url
        "#,
    )
    .bind(artist.artist_id)
    .bind(&artist.name)
    .bind(&artist.resource_url)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn upsert_label(conn: &mut SqliteConnection, label: &LabelCredit) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO labels (id, name, resource_url, entity_type)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            resource_url = excluded.resource_url,
            entity_type = excluded.entity_type
        "#,
    )
    .bind(label.label_id)
    .bind(&label.name)
    .bind(&label.resource_url)
    .bind(&label.entity_type)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Rebuild the artist links of a release; the artists must already exist
pub async fn replace_release_artists(
    conn: &mut SqliteConnection,
    release_id: i64,
    artists: &[ArtistCredit],
) -> Result<()> {
    sqlx::query("DELETE FROM release_artists WHERE release_id = ?")
        .bind(release_id)
        .execute(&mut *conn)
        .await?;

    for artist in artists {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO release_artists (
                release_id, artist_id, join_relation, anv, tracks, role
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(release_id)
        .bind(artist.artist_id)
        .bind(&artist.join_relation)
        .bind(&artist.anv)
        .bind(&artist.tracks)
        .bind(&artist.role)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Rebuild the label links of a release; the labels must already exist
pub async fn replace_release_labels(
    conn: &mut SqliteConnection,
    release_id: i64,
    labels: &[LabelCredit],
) -> Result<()> {
    sqlx::query("DELETE FROM release_labels WHERE release_id = ?")
        .bind(release_id)
        .execute(&mut *conn)
        .await?;

    for label in labels {
        sqlx::query(
            "INSERT OR IGNORE INTO release_labels (release_id, label_id, catno) VALUES (?, ?, ?)",
        )
        .bind(release_id)
        .bind(label.label_id)
        .bind(&label.catno)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Delete and reinsert every format (and its descriptions) of a release
pub async fn replace_formats(
    conn: &mut SqliteConnection,
    release_id: i64,
    formats: &[Format],
) -> Result<()> {
    // Descriptions go with their format through ON DELETE CASCADE.
    sqlx::query("DELETE FROM formats WHERE release_id = ?")
        .bind(release_id)
        .execute(&mut *conn)
        .await?;

    for format in formats {
        let format_id = sqlx::query("INSERT INTO formats (release_id, name, qty) VALUES (?, ?, ?)")
            .bind(release_id)
            .bind(&format.name)
            .bind(format.qty)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();

        for description in &format.descriptions {
            sqlx::query("INSERT INTO format_descriptions (format_id, description) VALUES (?, ?)")
                .bind(format_id)
                .bind(description)
                .execute(&mut *conn)
                .await?;
        }
    }

    Ok(())
}

/// Get-or-create each tag by name, then rebuild the release's links to them
pub async fn link_tags(
    conn: &mut SqliteConnection,
    kind: TagKind,
    release_id: i64,
    names: &[String],
) -> Result<()> {
    let delete_links = format!("DELETE FROM {} WHERE release_id = ?", kind.link_table());
    let insert_tag = format!("INSERT OR IGNORE INTO {} (name) VALUES (?)", kind.table());
    let select_tag = format!("SELECT id FROM {} WHERE name = ?", kind.table());
    let insert_link = format!(
        "INSERT OR IGNORE INTO {} (release_id, {}) VALUES (?, ?)",
        kind.link_table(),
        kind.link_column()
    );

    sqlx::query(&delete_links)
        .bind(release_id)
        .execute(&mut *conn)
        .await?;

    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        sqlx::query(&insert_tag)
            .bind(name)
            .execute(&mut *conn)
            .await?;

        let tag_id: i64 = sqlx::query_scalar(&select_tag)
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;

        sqlx::query(&insert_link)
            .bind(release_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub async fn link_genres(
    conn: &mut SqliteConnection,
    release_id: i64,
    genres: &[String],
) -> Result<()> {
    link_tags(conn, TagKind::Genre, release_id, genres).await
}

pub async fn link_styles(
    conn: &mut SqliteConnection,
    release_id: i64,
    styles: &[String],
) -> Result<()> {
    link_tags(conn, TagKind::Style, release_id, styles).await
}

pub async fn replace_notes(
    conn: &mut SqliteConnection,
    release_id: i64,
    notes: &[Note],
) -> Result<()> {
    sqlx::query("DELETE FROM release_notes WHERE release_id = ?")
        .bind(release_id)
        .execute(&mut *conn)
        .await?;

    for note in notes {
        sqlx::query(
            "INSERT OR REPLACE INTO release_notes (release_id, field_id, value) VALUES (?, ?, ?)",
        )
        .bind(release_id)
        .bind(note.field_id)
        .bind(&note.value)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use sqlx::SqlitePool;

    fn entry(id: i64, title: &str) -> ReleaseEntry {
        ReleaseEntry {
            id,
            instance_id: id * 10,
            folder_id: 1,
            rating: 0,
            title: title.to_string(),
            year: Some(1972),
            resource_url: format!("https://api.test/releases/{}", id),
            thumb: String::new(),
            cover_image: String::new(),
        }
    }

    fn artist(id: i64, name: &str) -> ArtistCredit {
        ArtistCredit {
            artist_id: id,
            name: name.to_string(),
            resource_url: format!("https://api.test/artists/{}", id),
            join_relation: String::new(),
            anv: String::new(),
            tracks: String::new(),
            role: String::new(),
        }
    }

    async fn count(pool: &SqlitePool, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_upsert_release_preserves_duration() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        upsert_release(&mut conn, &entry(7, "Harvest"), 100).await.unwrap();
        sqlx::query("UPDATE releases SET play_duration = 2280 WHERE id = 7")
            .execute(&mut *conn)
            .await
            .unwrap();
        upsert_release(&mut conn, &entry(7, "Harvest (Remaster)"), 200)
            .await
            .unwrap();
        drop(conn);

        let row: (String, Option<i64>, i64, i64) = sqlx::query_as(
            "SELECT title, play_duration, created_at, updated_at FROM releases WHERE id = 7",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(row, ("Harvest (Remaster)".to_string(), Some(2280), 100, 200));
    }

    #[tokio::test]
    async fn test_shared_artist_is_not_duplicated() {
        let pool = create_test_pool().await.unwrap();
        let mut tx = pool.begin().await.unwrap();

        for id in [1, 2] {
            upsert_release(&mut tx, &entry(id, "Record"), 100).await.unwrap();
            let credits = vec![artist(55, "Neil Young")];
            for credit in &credits {
                upsert_artist(&mut tx, credit).await.unwrap();
            }
            replace_release_artists(&mut tx, id, &credits).await.unwrap();
            replace_release_artists(&mut tx, id, &credits).await.unwrap();
        }
        tx.commit().await.unwrap();

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM artists").await, 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM release_artists").await, 2);
    }

    #[tokio::test]
    async fn test_replace_formats_drops_old_descriptions() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        upsert_release(&mut conn, &entry(3, "Kind of Blue"), 1).await.unwrap();

        let first = vec![Format::new("Vinyl", 2).with_descriptions(["12\"", "LP"])];
        replace_formats(&mut conn, 3, &first).await.unwrap();
        let second = vec![Format::new("CD", 1).with_descriptions(["Album"])];
        replace_formats(&mut conn, 3, &second).await.unwrap();
        drop(conn);

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM formats").await, 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM format_descriptions").await, 1);
    }

    #[tokio::test]
    async fn test_link_tags_get_or_create() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        upsert_release(&mut conn, &entry(1, "A"), 1).await.unwrap();
        upsert_release(&mut conn, &entry(2, "B"), 1).await.unwrap();

        let genres = vec!["Rock".to_string(), "Folk".to_string(), "Rock".to_string()];
        link_genres(&mut conn, 1, &genres).await.unwrap();
        link_genres(&mut conn, 2, &genres[..1]).await.unwrap();
        link_styles(&mut conn, 1, &["Folk Rock".to_string(), " ".to_string()])
            .await
            .unwrap();
        drop(conn);

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM genres").await, 2);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM release_genres").await, 3);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM styles").await, 1);
    }

    #[tokio::test]
    async fn test_rolled_back_page_leaves_nothing() {
        let pool = create_test_pool().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        upsert_release(&mut tx, &entry(9, "Blue"), 1).await.unwrap();
        replace_notes(
            &mut tx,
            9,
            &[Note {
                field_id: 3,
                value: "Signed".to_string(),
            }],
        )
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM releases").await, 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM release_notes").await, 0);
    }

    #[tokio::test]
    async fn test_invalid_release_rejected() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let result = upsert_release(&mut conn, &entry(0, "Nothing"), 1).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }
}
