use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "parley", about = "Parley: talk to your voice assistant from a terminal")]
pub struct Cli {
    /// Path to config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive terminal session
    Run,

    /// List the configured voices
    Voices,

    /// Print the composed system prompt and first message
    Prompt,

    /// Play a scripted session to completion and print its transcript
    Replay {
        /// Path to a TOML dialogue script
        script: PathBuf,
        /// Stop the session after this many seconds
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },

    /// Speak text once with the configured speech backend
    Say {
        text: String,
        #[arg(long)]
        voice: Option<String>,
    },
}
