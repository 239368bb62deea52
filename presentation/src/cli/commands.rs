//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for chatline
#[derive(Parser, Debug)]
#[command(name = "chatline")]
#[command(author, version, about = "Streaming chat with persisted conversations")]
#[command(long_about = r#"
chatline streams answers from a language model into the terminal and saves
each finished turn to the chat API.

Conversations are bound to one model: gpt-4o (OpenAI-compatible, including
Azure OpenAI deployments) or gemini-flash-1.5 (Gemini, accepts images).

Configuration files are loaded from (in priority order):
1. CHATLINE_* environment variables (e.g. CHATLINE_STREAM__INACTIVITY_TIMEOUT_SECS=30)
2. --config <path>     Explicit config file
3. ./chatline.toml     Project-level config
4. ~/.config/chatline/config.toml   Global config

Example:
  chatline --conversation 665f1c2e9b1e8a0012345678
  chatline --new "Explain ownership in Rust" --model gemini-flash-1.5
"#)]
pub struct Cli {
    /// Conversation to open
    #[arg(short, long, value_name = "ID", conflicts_with = "new")]
    pub conversation: Option<String>,

    /// Start a new conversation whose first message is TEXT
    #[arg(short, long, value_name = "TEXT")]
    pub new: Option<String>,

    /// Model for a new conversation
    #[arg(short, long, value_name = "MODEL", default_value = "gpt-4o")]
    pub model: String,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// `tracing` filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
