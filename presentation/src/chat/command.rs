//! Slash commands understood by the chat REPL

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Quit,
    /// Re-send the last answer that failed to save.
    Retry,
    /// Attach an image to the next message.
    Image {
        path: PathBuf,
        stored_path: Option<String>,
    },
    ClearImage,
    /// A known command with missing arguments.
    Usage(&'static str),
    Unknown(String),
}

impl ReplCommand {
    /// Parse a line starting with `/`. Returns `None` for ordinary messages.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let rest = line.strip_prefix('/')?;
        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default();

        let command = match name {
            "quit" | "exit" | "q" => ReplCommand::Quit,
            "help" | "h" | "?" => ReplCommand::Help,
            "retry" => ReplCommand::Retry,
            "clear-image" => ReplCommand::ClearImage,
            "image" | "img" => match words.next() {
                Some(path) => ReplCommand::Image {
                    path: PathBuf::from(path),
                    stored_path: words.next().map(str::to_string),
                },
                None => ReplCommand::Usage("/image <path> [stored-path]"),
            },
            _ => ReplCommand::Unknown(line.to_string()),
        };
        Some(command)
    }

    pub fn help() -> &'static str {
        "Commands:
  /help, /h, /?                 - Show this help
  /image <path> [stored-path]   - Attach an image to the next message
  /clear-image                  - Drop the pending image
  /retry                        - Save the last answer again after a failed save
  /quit, /exit, /q              - Exit chat

Press Ctrl-C while an answer is streaming to stop it."
    }
}
