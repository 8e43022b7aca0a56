//! `cache` subcommands.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::adapters::sqlite::{initialize_database, sqlite_repositories};
use crate::cli::output::{output, JudgmentList, PurgeResult};
use crate::cli::types::CacheCommands;
use crate::domain::models::Config;

/// Judgment cache commands only need the database.
pub async fn execute(command: CacheCommands, config: &Config, json: bool) -> Result<()> {
    let pool = initialize_database(&config.database)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    let repos = sqlite_repositories(&pool);

    let result = match command {
        CacheCommands::List { limit } => repos
            .judgments
            .list(limit)
            .await
            .map(|rows| output(&JudgmentList(rows), json))
            .context("Failed to list judgments"),
        CacheCommands::Purge => repos
            .judgments
            .delete_expired(Utc::now())
            .await
            .map(|deleted| output(&PurgeResult { deleted }, json))
            .context("Failed to purge judgments"),
    };

    pool.close().await;
    result
}
