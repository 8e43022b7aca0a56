//! SQLite implementation of the UserRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::{format_datetime, parse_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::User;
use crate::domain::ports::UserRepository;

/// `users` table access.
#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn upsert(&self, user: &User) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO users (id, name, is_bot, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   is_bot = excluded.is_bot,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.is_bot)
        .bind(format_datetime(user.created_at))
        .bind(format_datetime(user.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: &str) -> DomainResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    is_bot: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            is_bot: row.is_bot,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let repo = SqliteUserRepository::new(create_migrated_test_pool().await.unwrap());
        let original = User::new("U1", "ada", false);
        repo.upsert(&original).await.unwrap();

        let mut renamed = User::new("U1", "ada.l", false);
        renamed.created_at = original.created_at + chrono::Duration::hours(1);
        repo.upsert(&renamed).await.unwrap();

        let stored = repo.find("U1").await.unwrap().unwrap();
        assert_eq!(stored.name, "ada.l");
        assert_eq!(
            format_datetime(stored.created_at),
            format_datetime(original.created_at)
        );
        assert!(repo.find("U2").await.unwrap().is_none());
    }
}
