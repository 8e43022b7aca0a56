//! Autoreply CLI entry point.

use clap::Parser;

use autoreply::cli::{commands, handle_error, load_config, Cli, Commands};
use autoreply::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli.command, cli.config.as_deref(), cli.json).await;
    if let Err(err) = result {
        handle_error(&err, cli.json);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config_path: Option<&std::path::Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let _logger = LoggerImpl::init(&config.logging)?;

    match command {
        Commands::Run => commands::run::execute(config).await,
        Commands::Once(once) => commands::once::execute(once, config, json).await,
        Commands::Cache(cache) => commands::cache::execute(cache, &config, json).await,
        Commands::Config(show) => commands::config::execute(show, &config, json),
    }
}
