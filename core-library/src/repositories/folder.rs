//! Folder repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Folder;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Folder repository interface
#[async_trait]
pub trait FolderRepository: Send + Sync {
    /// All stored folders ordered by id
    async fn get_folders(&self) -> Result<Vec<Folder>>;

    /// Find a folder by its upstream id
    ///
    /// # Returns
    /// - `Ok(Some(folder))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: i64) -> Result<Option<Folder>>;

    /// Insert or update a folder, stamping `last_synced`
    ///
    /// # Errors
    /// Returns error if validation fails or a database error occurs
    async fn upsert_folder(&self, folder: &Folder, synced_at: i64) -> Result<()>;
}

/// SQLite implementation of FolderRepository
pub struct SqliteFolderRepository {
    pool: SqlitePool,
}

impl SqliteFolderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn validate_folder(folder: &Folder) -> Result<()> {
        folder.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "Folder".to_string(),
            message: msg,
        })
    }
}

#[async_trait]
impl FolderRepository for SqliteFolderRepository {
    async fn get_folders(&self) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(
            "SELECT id, name, item_count, resource_url, last_synced FROM folders ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(folders)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(
            "SELECT id, name, item_count, resource_url, last_synced FROM folders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(folder)
    }

    async fn upsert_folder(&self, folder: &Folder, synced_at: i64) -> Result<()> {
        Self::validate_folder(folder)?;

        sqlx::query(
            r#"
            INSERT INTO folders (id, name, item_count, resource_url, last_synced)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                item_count = excluded.item_count,
                resource_url = excluded.resource_url,
                last_synced = excluded.last_synced
            "#,
        )
        .bind(folder.id)
        .bind(&folder.name)
        .bind(folder.item_count)
        .bind(&folder.resource_url)
        .bind(synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn folder(id: i64, name: &str, count: i64) -> Folder {
        Folder {
            id,
            name: name.to_string(),
            item_count: count,
            resource_url: format!("https://api.test/users/u/collection/folders/{}", id),
            last_synced: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_find_folder() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteFolderRepository::new(pool);

        repo.upsert_folder(&folder(1, "Uncategorized", 12), 100)
            .await
            .unwrap();

        let found = repo.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(found.name, "Uncategorized");
        assert_eq!(found.item_count, 12);
        assert_eq!(found.last_synced, Some(100));
        assert!(repo.find_by_id(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteFolderRepository::new(pool);

        repo.upsert_folder(&folder(1, "Jazz", 3), 100).await.unwrap();
        repo.upsert_folder(&folder(1, "Jazz & Soul", 5), 200)
            .await
            .unwrap();
        repo.upsert_folder(&folder(0, "All", 5), 200).await.unwrap();

        let folders = repo.get_folders().await.unwrap();
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].id, 0);
        assert_eq!(folders[1].name, "Jazz & Soul");
        assert_eq!(folders[1].item_count, 5);
        assert_eq!(folders[1].last_synced, Some(200));
    }

    #[tokio::test]
    async fn test_rejects_invalid_folder() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteFolderRepository::new(pool);

        let result = repo.upsert_folder(&folder(4, "  ", 0), 1).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }
}
