mod cli;
mod commands;
mod console;
mod export;
mod setup;
mod tools;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use parley_core::config::AppConfig;
use parley_core::lifecycle;

use cli::{Cli, Commands};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    lifecycle::init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref());

    match cli.command {
        Commands::Run => {
            lifecycle::log_startup();
            console::run(&config).await?;
            lifecycle::log_shutdown();
        }
        Commands::Voices => commands::voices(&config)?,
        Commands::Prompt => commands::prompt(&config)?,
        Commands::Replay {
            script,
            timeout_secs,
        } => {
            console::replay(&config, &script, Duration::from_secs(timeout_secs)).await?;
        }
        Commands::Say { text, voice } => commands::say(&config, text, voice).await?,
    }

    Ok(())
}
