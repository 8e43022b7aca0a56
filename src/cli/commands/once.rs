//! `once` subcommands.

use anyhow::{Context, Result};

use crate::application::Worker;
use crate::cli::output::output;
use crate::cli::types::OnceCommands;
use crate::domain::models::Config;

/// Run one pass of a use case against the real collaborators.
pub async fn execute(command: OnceCommands, config: Config, json: bool) -> Result<()> {
    let worker = Worker::from_config(config).await?;
    match command {
        OnceCommands::Check => {
            let report = worker
                .responder()
                .run_once()
                .await
                .context("Autonomous check failed")?;
            output(&report, json);
        }
        OnceCommands::Summarize => {
            let report = worker
                .summarizer()
                .run_once()
                .await
                .context("Memory summarization failed")?;
            output(&report, json);
        }
        OnceCommands::SyncChannels => {
            let report = worker
                .channel_sync()
                .run_once()
                .await
                .context("Channel sync failed")?;
            output(&report, json);
        }
    }
    Ok(())
}
