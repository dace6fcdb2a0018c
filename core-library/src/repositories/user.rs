//! User repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::User;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Access to the single local user
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// The stored user, if a token has been registered
    async fn get_user(&self) -> Result<Option<User>>;

    /// Store `user` as the local user, replacing any previous one
    ///
    /// # Errors
    /// Returns error if validation fails or a database error occurs
    async fn save_user(&self, user: &User, now: i64) -> Result<()>;
}

/// SQLite implementation of UserRepository
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn get_user(&self) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT username, token FROM users WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn save_user(&self, user: &User, now: i64) -> Result<()> {
        user.validate().map_err(|message| LibraryError::InvalidInput {
            field: "User".to_string(),
            message,
        })?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, token, created_at, updated_at)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                token = excluded.token,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.token)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
