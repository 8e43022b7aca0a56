//! `run` subcommand.

use anyhow::{Context, Result};
use tracing::error;

use crate::application::Worker;
use crate::domain::models::Config;

/// Run the worker until Ctrl-C.
pub async fn execute(config: Config) -> Result<()> {
    let worker = Worker::from_config(config)
        .await
        .context("Failed to start worker")?;

    let clean = worker
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C, shutting down");
            }
        })
        .await;

    if !clean {
        anyhow::bail!("worker did not shut down cleanly");
    }
    Ok(())
}
