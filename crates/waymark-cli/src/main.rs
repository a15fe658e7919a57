//! Waymark CLI Application
//!
//! Terminal host for the waymark workflow engine: runs plans with consent
//! prompts and progress output, and browses or reverts the change history.

mod args;
mod cli;
mod prompt;
mod renderer;

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use log::info;
use renderer::TerminalRenderer;
use waymark_core::EngineConfig;

const API_KEYS_ENV: &str = "WAYMARK_API_KEYS";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        database_file,
        config,
        api_keys,
        no_color,
        command,
    } = Args::parse();

    let mut engine_config = match &config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::load_default().context("Failed to load config")?,
    };
    for key in &api_keys {
        engine_config.add_api_keys(key);
    }
    if let Ok(keys) = std::env::var(API_KEYS_ENV) {
        engine_config.add_api_keys(&keys);
    }

    info!("Waymark started");

    let cli = Cli::new(engine_config, database_file, TerminalRenderer::new(!no_color));
    let code = match command {
        Commands::Run(args) => cli.run(args).await?,
        Commands::Validate { plan } => cli.validate(&plan).await?,
        Commands::History { command } => cli.handle_history_command(command).await?,
        Commands::Analyze(args) => cli.analyze(args).await?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
