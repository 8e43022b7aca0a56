//! SQLite implementation of the MemoRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Memo;
use crate::domain::ports::MemoRepository;

/// `memos` table access.
#[derive(Clone)]
pub struct SqliteMemoRepository {
    pool: SqlitePool,
}

impl SqliteMemoRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemoRepository for SqliteMemoRepository {
    async fn upsert(&self, memo: &Memo) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO memos (id, channel_id, content, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   channel_id = excluded.channel_id,
                   content = excluded.content,
                   updated_at = excluded.updated_at"#,
        )
        .bind(memo.id.to_string())
        .bind(&memo.channel_id)
        .bind(&memo.content)
        .bind(format_datetime(memo.created_at))
        .bind(format_datetime(memo.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, channel_id: Option<&str>) -> DomainResult<Vec<Memo>> {
        let rows: Vec<MemoRow> = match channel_id {
            Some(channel_id) => {
                sqlx::query_as(
                    "SELECT * FROM memos WHERE channel_id IS NULL OR channel_id = ? ORDER BY created_at",
                )
                .bind(channel_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM memos ORDER BY created_at")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Memo::try_from).collect()
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM memos WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct MemoRow {
    id: String,
    channel_id: Option<String>,
    content: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<MemoRow> for Memo {
    type Error = DomainError;

    fn try_from(row: MemoRow) -> Result<Self, Self::Error> {
        Ok(Memo {
            id: parse_uuid(&row.id)?,
            channel_id: row.channel_id,
            content: row.content,
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
    async fn test_list_includes_workspace_memos() {
        let repo = SqliteMemoRepository::new(create_migrated_test_pool().await.unwrap());
        repo.upsert(&Memo::new(None, "Never share credentials.")).await.unwrap();
        repo.upsert(&Memo::new(Some("C1".to_string()), "C1 is the on-call channel."))
            .await
            .unwrap();
        repo.upsert(&Memo::new(Some("C2".to_string()), "C2 is social.")).await.unwrap();

        let for_c1: Vec<String> = repo
            .list(Some("C1"))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(for_c1.len(), 2);
        assert!(for_c1.contains(&"Never share credentials.".to_string()));
        assert!(!for_c1.contains(&"C2 is social.".to_string()));

        assert_eq!(repo.list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = SqliteMemoRepository::new(create_migrated_test_pool().await.unwrap());
        let memo = Memo::new(None, "temporary");
        repo.upsert(&memo).await.unwrap();

        assert!(repo.delete(memo.id).await.unwrap());
        assert!(!repo.delete(memo.id).await.unwrap());
        assert!(repo.list(None).await.unwrap().is_empty());
    }
}
