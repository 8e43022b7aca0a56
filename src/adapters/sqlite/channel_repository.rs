//! SQLite implementation of the ChannelRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::{format_datetime, parse_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Channel;
use crate::domain::ports::ChannelRepository;

/// `channels` table access.
#[derive(Clone)]
pub struct SqliteChannelRepository {
    pool: SqlitePool,
}

impl SqliteChannelRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelRepository for SqliteChannelRepository {
    async fn upsert(&self, channel: &Channel) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO channels (id, name, is_member, active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   is_member = excluded.is_member,
                   active = excluded.active,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&channel.id)
        .bind(&channel.name)
        .bind(channel.is_member)
        .bind(channel.active)
        .bind(format_datetime(channel.created_at))
        .bind(format_datetime(channel.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: &str) -> DomainResult<Option<Channel>> {
        let row: Option<ChannelRow> = sqlx::query_as("SELECT * FROM channels WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Channel::try_from).transpose()
    }

    async fn list_active(&self) -> DomainResult<Vec<Channel>> {
        let rows: Vec<ChannelRow> =
            sqlx::query_as("SELECT * FROM channels WHERE active = 1 AND is_member = 1 ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Channel::try_from).collect()
    }

    async fn deactivate_missing(&self, keep_ids: &[String]) -> DomainResult<u64> {
        let now = format_datetime(chrono::Utc::now());
        let result = if keep_ids.is_empty() {
            sqlx::query("UPDATE channels SET active = 0, updated_at = ? WHERE active = 1")
                .bind(&now)
                .execute(&self.pool)
                .await?
        } else {
            let placeholders = vec!["?"; keep_ids.len()].join(", ");
            let sql = format!(
                "UPDATE channels SET active = 0, updated_at = ? WHERE active = 1 AND id NOT IN ({placeholders})"
            );
            let mut query = sqlx::query(&sql).bind(&now);
            for id in keep_ids {
                query = query.bind(id);
            }
            query.execute(&self.pool).await?
        };

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct ChannelRow {
    id: String,
    name: String,
    is_member: bool,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = DomainError;

    fn try_from(row: ChannelRow) -> Result<Self, Self::Error> {
        Ok(Channel {
            id: row.id,
            name: row.name,
            is_member: row.is_member,
            active: row.active,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
