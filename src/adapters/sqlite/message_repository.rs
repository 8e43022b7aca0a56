//! SQLite implementation of the MessageRepository.
//!
//! Platform timestamps are stored as text and compared numerically with
//! `CAST(ts AS REAL)`.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::{format_datetime, parse_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Message, Scope};
use crate::domain::ports::MessageRepository;

/// `messages` table access.
#[derive(Clone)]
pub struct SqliteMessageRepository {
    pool: SqlitePool,
}

impl SqliteMessageRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn upsert(&self, message: &Message) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO messages (channel_id, ts, thread_ts, user_id, text, created_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(channel_id, ts) DO UPDATE SET
                   thread_ts = excluded.thread_ts,
                   user_id = excluded.user_id,
                   text = excluded.text"#,
        )
        .bind(&message.channel_id)
        .bind(&message.ts)
        .bind(&message.thread_ts)
        .bind(&message.user_id)
        .bind(&message.text)
        .bind(format_datetime(message.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_in_scope(&self, scope: &Scope) -> DomainResult<Option<Message>> {
        let row: Option<MessageRow> = match &scope.thread_ts {
            Some(thread_ts) => {
                sqlx::query_as(
                    r#"SELECT * FROM messages
                       WHERE channel_id = ?1 AND (thread_ts = ?2 OR ts = ?2)
                       ORDER BY CAST(ts AS REAL) DESC LIMIT 1"#,
                )
                .bind(&scope.channel_id)
                .bind(thread_ts)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"SELECT * FROM messages
                       WHERE channel_id = ? AND thread_ts IS NULL
                       ORDER BY CAST(ts AS REAL) DESC LIMIT 1"#,
                )
                .bind(&scope.channel_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(Message::try_from).transpose()
    }

    async fn list_since(&self, channel_id: &str, after_ts: Option<&str>, limit: u32) -> DomainResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"SELECT * FROM messages
               WHERE channel_id = ?1 AND (?2 IS NULL OR CAST(ts AS REAL) > CAST(?2 AS REAL))
               ORDER BY CAST(ts AS REAL) ASC LIMIT ?3"#,
        )
        .bind(channel_id)
        .bind(after_ts)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn active_scopes(&self, channel_id: &str, since_ts: &str, limit: u32) -> DomainResult<Vec<Scope>> {
        let rows: Vec<(Option<String>, f64)> = sqlx::query_as(
            r#"SELECT thread_ts, MAX(CAST(ts AS REAL)) AS last_ts FROM messages
               WHERE channel_id = ?1 AND CAST(ts AS REAL) > CAST(?2 AS REAL)
               GROUP BY thread_ts
               ORDER BY last_ts DESC LIMIT ?3"#,
        )
        .bind(channel_id)
        .bind(since_ts)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(thread_ts, _)| Scope::new(channel_id, thread_ts))
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    channel_id: String,
    ts: String,
    thread_ts: Option<String>,
    user_id: String,
    text: String,
    created_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = DomainError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            channel_id: row.channel_id,
            ts: row.ts,
            thread_ts: row.thread_ts,
            user_id: row.user_id,
            text: row.text,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use chrono::Utc;

    async fn setup_test_repo() -> SqliteMessageRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteMessageRepository::new(pool)
    }

    fn msg(channel: &str, ts: &str, thread: Option<&str>, text: &str) -> Message {
        Message {
            channel_id: channel.to_string(),
            ts: ts.to_string(),
            thread_ts: thread.map(str::to_string),
            user_id: "U1".to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_text() {
        let repo = setup_test_repo().await;
        repo.upsert(&msg("C1", "100.0", None, "first")).await.unwrap();
        repo.upsert(&msg("C1", "100.0", None, "edited")).await.unwrap();

        let latest = repo.latest_in_scope(&Scope::top_level("C1")).await.unwrap().unwrap();
        assert_eq!(latest.text, "edited");
        assert_eq!(repo.list_since("C1", None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_latest_in_scope_separates_threads() {
        let repo = setup_test_repo().await;
        repo.upsert(&msg("C1", "100.0", None, "parent")).await.unwrap();
        repo.upsert(&msg("C1", "101.0", Some("100.0"), "reply")).await.unwrap();
        repo.upsert(&msg("C1", "99.0", None, "older")).await.unwrap();

        let top = repo.latest_in_scope(&Scope::top_level("C1")).await.unwrap().unwrap();
        assert_eq!(top.ts, "100.0");

        let thread = Scope::new("C1", Some("100.0".to_string()));
        let reply = repo.latest_in_scope(&thread).await.unwrap().unwrap();
        assert_eq!(reply.ts, "101.0");

        assert!(repo.latest_in_scope(&Scope::top_level("C2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timestamps_compare_numerically() {
        let repo = setup_test_repo().await;
        // Lexically "99.5" > "100.1"; numerically it is older.
        repo.upsert(&msg("C1", "99.5", None, "old")).await.unwrap();
        repo.upsert(&msg("C1", "100.1", None, "new")).await.unwrap();

        let latest = repo.latest_in_scope(&Scope::top_level("C1")).await.unwrap().unwrap();
        assert_eq!(latest.text, "new");

        let since = repo.list_since("C1", Some("99.5"), 10).await.unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].ts, "100.1");
    }

    #[tokio::test]
    async fn test_list_since_is_oldest_first_and_limited() {
        let repo = setup_test_repo().await;
        for ts in ["103.0", "101.0", "102.0"] {
            repo.upsert(&msg("C1", ts, None, ts)).await.unwrap();
        }

        let all: Vec<String> = repo
            .list_since("C1", None, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.ts)
            .collect();
        assert_eq!(all, vec!["101.0", "102.0", "103.0"]);
        assert_eq!(repo.list_since("C1", None, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_active_scopes_most_recent_first() {
        let repo = setup_test_repo().await;
        repo.upsert(&msg("C1", "100.0", None, "top")).await.unwrap();
        repo.upsert(&msg("C1", "105.0", Some("100.0"), "thread")).await.unwrap();
        repo.upsert(&msg("C1", "50.0", Some("40.0"), "stale thread")).await.unwrap();

        let scopes = repo.active_scopes("C1", "90.0", 10).await.unwrap();
        assert_eq!(
            scopes,
            vec![
                Scope::new("C1", Some("100.0".to_string())),
                Scope::top_level("C1"),
            ]
        );
    }
}
