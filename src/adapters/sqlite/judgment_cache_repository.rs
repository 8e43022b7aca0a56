//! SQLite implementation of the JudgmentCacheRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::adapters::sqlite::{format_datetime, parse_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{JudgmentCache, Scope};
use crate::domain::ports::JudgmentCacheRepository;

/// `judgment_cache` table access.
#[derive(Clone)]
pub struct SqliteJudgmentCacheRepository {
    pool: SqlitePool,
}

impl SqliteJudgmentCacheRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JudgmentCacheRepository for SqliteJudgmentCacheRepository {
    async fn find(&self, scope: &Scope) -> DomainResult<Option<JudgmentCache>> {
        let row: Option<JudgmentCacheRow> =
            sqlx::query_as("SELECT * FROM judgment_cache WHERE channel_id = ? AND scope = ?")
                .bind(&scope.channel_id)
                .bind(scope.key())
                .fetch_optional(&self.pool)
                .await?;

        row.map(JudgmentCache::try_from).transpose()
    }

    async fn upsert(&self, cache: &JudgmentCache) -> DomainResult<()> {
        let scope = cache.scope();
        sqlx::query(
            r#"INSERT INTO judgment_cache (channel_id, scope, thread_ts, should_respond, confidence,
                   reason, latest_message_ts, next_check_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(channel_id, scope) DO UPDATE SET
                   should_respond = excluded.should_respond,
                   confidence = excluded.confidence,
                   reason = excluded.reason,
                   latest_message_ts = excluded.latest_message_ts,
                   next_check_at = excluded.next_check_at,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&cache.channel_id)
        .bind(scope.key())
        .bind(&cache.thread_ts)
        .bind(cache.should_respond)
        .bind(cache.confidence)
        .bind(&cache.reason)
        .bind(&cache.latest_message_ts)
        .bind(format_datetime(cache.next_check_at))
        .bind(format_datetime(cache.created_at))
        .bind(format_datetime(cache.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM judgment_cache WHERE next_check_at < ?")
            .bind(format_datetime(before))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list(&self, limit: u32) -> DomainResult<Vec<JudgmentCache>> {
        let rows: Vec<JudgmentCacheRow> =
            sqlx::query_as("SELECT * FROM judgment_cache ORDER BY next_check_at ASC LIMIT ?")
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(JudgmentCache::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct JudgmentCacheRow {
    channel_id: String,
    #[allow(dead_code)]
    scope: String,
    thread_ts: Option<String>,
    should_respond: bool,
    confidence: f64,
    reason: String,
    latest_message_ts: String,
    next_check_at: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<JudgmentCacheRow> for JudgmentCache {
    type Error = DomainError;

    fn try_from(row: JudgmentCacheRow) -> Result<Self, Self::Error> {
        Ok(JudgmentCache {
            channel_id: row.channel_id,
            thread_ts: row.thread_ts,
            should_respond: row.should_respond,
            confidence: row.confidence,
            reason: row.reason,
            latest_message_ts: row.latest_message_ts,
            next_check_at: parse_datetime(&row.next_check_at)?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
