//! Interactive chat

pub mod attachment;
pub mod command;
pub mod repl;

pub use attachment::AttachmentSource;
pub use command::ReplCommand;
pub use repl::ChatRepl;
