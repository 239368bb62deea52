//! Presentation layer for chatline
//!
//! This crate contains CLI definitions, console rendering of streaming
//! turns, and the interactive chat interface.

pub mod chat;
pub mod cli;
pub mod output;

// Re-export commonly used types
pub use chat::{AttachmentSource, ChatRepl, ReplCommand};
pub use cli::commands::Cli;
pub use output::console::ConsoleTurnObserver;
pub use output::viewport::TerminalViewport;
