//! SQLite implementation of the MemoryRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::{format_datetime, parse_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Memory;
use crate::domain::ports::MemoryRepository;

/// `memories` table access.
#[derive(Clone)]
pub struct SqliteMemoryRepository {
    pool: SqlitePool,
}

impl SqliteMemoryRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemoryRepository for SqliteMemoryRepository {
    async fn find(&self, channel_id: &str) -> DomainResult<Option<Memory>> {
        let row: Option<MemoryRow> = sqlx::query_as("SELECT * FROM memories WHERE channel_id = ?")
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Memory::try_from).transpose()
    }

    async fn upsert(&self, memory: &Memory) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO memories (channel_id, content, message_count, last_message_ts, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(channel_id) DO UPDATE SET
                   content = excluded.content,
                   message_count = excluded.message_count,
                   last_message_ts = excluded.last_message_ts,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&memory.channel_id)
        .bind(&memory.content)
        .bind(i64::try_from(memory.message_count).unwrap_or(i64::MAX))
        .bind(&memory.last_message_ts)
        .bind(format_datetime(memory.created_at))
        .bind(format_datetime(memory.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct MemoryRow {
    channel_id: String,
    content: String,
    message_count: i64,
    last_message_ts: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<MemoryRow> for Memory {
    type Error = DomainError;

    fn try_from(row: MemoryRow) -> Result<Self, Self::Error> {
        Ok(Memory {
            channel_id: row.channel_id,
            content: row.content,
            message_count: u64::try_from(row.message_count).unwrap_or_default(),
            last_message_ts: row.last_message_ts,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
