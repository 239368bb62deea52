//! REPL (Read-Eval-Print Loop) for interactive chat

use crate::chat::{AttachmentSource, ReplCommand};
use crate::output::console::ConsoleTurnObserver;
use chatline_application::{ChatTurnController, TurnError, TurnOutcome};
use chatline_domain::PendingAttachment;
use colored::Colorize;
use reedline::{DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

const HISTORY_CAPACITY: usize = 1000;

/// Interactive chat REPL bound to one conversation
pub struct ChatRepl {
    controller: Arc<ChatTurnController>,
    attachments: Option<Arc<dyn AttachmentSource>>,
    history_file: Option<PathBuf>,
}

impl ChatRepl {
    pub fn new(controller: Arc<ChatTurnController>) -> Self {
        Self {
            controller,
            attachments: None,
            history_file: default_history_file(),
        }
    }

    /// Enable `/image`.
    pub fn with_attachments(mut self, source: Arc<dyn AttachmentSource>) -> Self {
        self.attachments = Some(source);
        self
    }

    /// Override where input history is kept; `None` disables it.
    pub fn with_history_file(mut self, path: Option<PathBuf>) -> Self {
        self.history_file = path;
        self
    }

    /// Run the interactive REPL
    ///
    /// A freshly created conversation gets its first answer before the
    /// prompt appears.
    pub async fn run(&self) -> std::io::Result<()> {
        let mut editor = self.editor();
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(">>>".to_string()),
            DefaultPromptSegment::Empty,
        );

        self.print_welcome();

        let bootstrap = self.controller.bootstrap();
        self.drive(bootstrap).await;

        loop {
            let line = match editor.read_line(&prompt)? {
                Signal::Success(line) => line,
                Signal::CtrlC => {
                    println!("^C");
                    continue;
                }
                Signal::CtrlD => {
                    println!("Bye!");
                    break;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(command) = ReplCommand::parse(line) {
                if self.handle_command(command).await {
                    break;
                }
                continue;
            }

            let turn = self.controller.submit(line);
            self.drive(turn).await;
        }

        Ok(())
    }

    fn editor(&self) -> Reedline {
        let editor = Reedline::create();
        let Some(path) = &self.history_file else {
            return editor;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match FileBackedHistory::with_file(HISTORY_CAPACITY, path.clone()) {
            Ok(history) => editor.with_history(Box::new(history)),
            Err(e) => {
                warn!("Input history unavailable at {}: {}", path.display(), e);
                editor
            }
        }
    }

    fn print_welcome(&self) {
        let conversation = self.controller.conversation();
        println!();
        println!("{}", ConsoleTurnObserver::header(&conversation));
        println!("Type /help for commands.");
        println!();
        ConsoleTurnObserver::print_history(&conversation);
    }

    /// Await a turn, cancelling it on Ctrl-C.
    async fn drive(&self, turn: impl Future<Output = Result<TurnOutcome, TurnError>>) {
        tokio::pin!(turn);
        let result = tokio::select! {
            result = &mut turn => result,
            _ = tokio::signal::ctrl_c() => {
                self.controller.cancel();
                turn.await
            }
        };
        self.after_turn(result);
    }

    fn after_turn(&self, result: Result<TurnOutcome, TurnError>) {
        match result {
            Ok(TurnOutcome::Committed { partial: true, .. }) => {
                println!("{}", "(partial answer saved)".dimmed());
            }
            Ok(outcome) => debug!("Turn finished: {:?}", outcome),
            Err(TurnError::Cancelled) => println!("{}", "^C (answer stopped)".dimmed()),
            Err(e) if e.is_blocking() => {
                eprintln!("Press Enter to continue");
                let _ = std::io::stdin().read_line(&mut String::new());
            }
            // Already shown by the observer.
            Err(_) => {
                if self.controller.has_failed_commit() {
                    println!("{}", "Answer not saved. Type /retry to try again.".yellow());
                }
            }
        }
    }

    /// Handle slash commands. Returns true if should exit.
    async fn handle_command(&self, command: ReplCommand) -> bool {
        match command {
            ReplCommand::Quit => {
                println!("Bye!");
                return true;
            }
            ReplCommand::Help => {
                println!();
                println!("{}", ReplCommand::help());
                println!();
            }
            ReplCommand::Retry => match self.controller.retry_commit().await {
                Ok(_) => println!("{}", "Saved.".green()),
                Err(TurnError::NothingToRetry) => println!("Nothing to retry."),
                Err(e) => self.after_turn(Err(e)),
            },
            ReplCommand::Image { path, stored_path } => {
                self.attach(path, stored_path).await;
            }
            ReplCommand::ClearImage => {
                self.controller.clear_attachment();
                println!("Image cleared.");
            }
            ReplCommand::Usage(usage) => println!("Usage: {}", usage),
            ReplCommand::Unknown(cmd) => {
                println!("Unknown command: {}", cmd);
                println!("Type /help for available commands");
            }
        }
        false
    }

    async fn attach(&self, path: PathBuf, stored_path: Option<String>) {
        let Some(source) = &self.attachments else {
            println!("Images are not available in this session.");
            return;
        };

        self.controller.attach(PendingAttachment::loading());
        match source.load(&path, stored_path).await {
            Ok(attachment) => {
                let stored = attachment.stored_path().unwrap_or_default().to_string();
                self.controller.attach(attachment);
                println!("{} {}", "Attached".green(), stored);
            }
            Err(message) => {
                eprintln!("{} {}", "Image failed:".red().bold(), message);
                self.controller.attach(PendingAttachment::failed(message));
                println!("Use /clear-image or attach another image before sending.");
            }
        }
    }
}

fn default_history_file() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("chatline").join("history.txt"))
}
