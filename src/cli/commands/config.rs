//! `config` subcommands.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::cli::types::ConfigCommands;
use crate::domain::models::Config;

const MASK: &str = "********";

/// Printable view of the effective configuration.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigView(Config);

impl ConfigView {
    /// Effective config with credentials masked.
    pub fn redacted(config: &Config) -> Self {
        let mut config = config.clone();
        if config.slack.bot_token.is_some() {
            config.slack.bot_token = Some(MASK.to_string());
        }
        if config.llm.api_key.is_some() {
            config.llm.api_key = Some(MASK.to_string());
        }
        Self(config)
    }
}

impl CommandOutput for ConfigView {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.0).unwrap_or_else(|e| format!("<unprintable config: {e}>"))
    }
}

/// Run a `config` subcommand.
pub fn execute(command: ConfigCommands, config: &Config, json: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => output(&ConfigView::redacted(config), json),
    }
    Ok(())
}
