//! SQLite database adapters for the autoreply worker.

pub mod channel_repository;
pub mod connection;
pub mod judgment_cache_repository;
pub mod memo_repository;
pub mod memory_repository;
pub mod message_repository;
pub mod migrations;
pub mod user_repository;

pub use channel_repository::SqliteChannelRepository;
pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError};
pub use judgment_cache_repository::SqliteJudgmentCacheRepository;
pub use memo_repository::SqliteMemoRepository;
pub use memory_repository::SqliteMemoryRepository;
pub use message_repository::SqliteMessageRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use user_repository::SqliteUserRepository;

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::DatabaseConfig;
use crate::domain::ports::Repositories;

/// Parse a UUID string from a SQLite row field.
pub fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fixed-width RFC3339 so stored timestamps compare correctly as text.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Errors raised while preparing storage.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Opening the pool failed.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    /// Applying migrations failed.
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
    /// Any other query failure.
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

/// Open the configured database and bring its schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(config).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

/// SQLite-backed implementations of every repository port.
pub fn sqlite_repositories(pool: &SqlitePool) -> Repositories {
    Repositories {
        messages: Arc::new(SqliteMessageRepository::new(pool.clone())),
        users: Arc::new(SqliteUserRepository::new(pool.clone())),
        channels: Arc::new(SqliteChannelRepository::new(pool.clone())),
        judgments: Arc::new(SqliteJudgmentCacheRepository::new(pool.clone())),
        memories: Arc::new(SqliteMemoryRepository::new(pool.clone())),
        memos: Arc::new(SqliteMemoRepository::new(pool.clone())),
    }
}
