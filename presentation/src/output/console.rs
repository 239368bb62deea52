//! Console rendering of the turn in progress

use chatline_application::{TurnError, TurnObserver, TurnWarning};
use chatline_domain::{Conversation, Role, StreamState, TurnPhase};
use colored::Colorize;
use std::io::Write;
use std::sync::Mutex;

/// Streams the growing answer to stdout.
///
/// Every [`StreamState`] snapshot carries the whole answer so far, so the
/// observer remembers how many bytes it already printed and writes only the
/// rest.
#[derive(Default)]
pub struct ConsoleTurnObserver {
    printed: Mutex<usize>,
}

impl ConsoleTurnObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The part of `answer` not printed yet, advancing the cursor past it.
    fn take_unseen(&self, answer: &str) -> Option<String> {
        let mut printed = self.printed.lock().unwrap_or_else(|e| e.into_inner());
        // The answer only shrinks when a saved turn is cleared; nothing to print.
        let unseen = answer.get(*printed..)?;
        if unseen.is_empty() {
            return None;
        }
        *printed = answer.len();
        Some(unseen.to_string())
    }

    fn reset(&self) -> usize {
        let mut printed = self.printed.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *printed)
    }

    /// Print a loaded conversation's history.
    pub fn print_history(conversation: &Conversation) {
        for turn in &conversation.history {
            let text = turn.first_text().unwrap_or_default();
            match turn.role {
                Role::User => println!("{} {}", ">>>".cyan().bold(), text),
                Role::System => continue,
                _ => println!("{}\n", text),
            }
            if let Some(img) = &turn.img {
                println!("    {} {}", "image:".dimmed(), img.dimmed());
            }
        }
    }

    /// One-line header for a conversation.
    pub fn header(conversation: &Conversation) -> String {
        let mut header = format!(
            "{} {}",
            "Conversation".cyan().bold(),
            conversation.id.as_str()
        );
        header.push_str(&format!("  {} {}", "model:".dimmed(), conversation.model));
        if conversation.is_custom_chatbot {
            header.push_str(&format!("  {}", "[custom chatbot]".magenta()));
        }
        header
    }
}

impl TurnObserver for ConsoleTurnObserver {
    fn on_state(&self, state: &StreamState) {
        if let Some(unseen) = self.take_unseen(&state.accumulated_answer) {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(unseen.as_bytes());
            let _ = stdout.flush();
        }
    }

    fn on_phase(&self, phase: TurnPhase) {
        match phase {
            TurnPhase::Submitting => {
                self.reset();
            }
            TurnPhase::Streaming | TurnPhase::Persisting => {}
            TurnPhase::Idle => {
                if self.reset() > 0 {
                    println!("\n");
                }
            }
        }
    }

    fn on_warning(&self, warning: &TurnWarning) {
        eprintln!("{} {}", "Warning:".yellow().bold(), warning);
    }

    fn on_error(&self, error: &TurnError) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    fn on_blocking_notice(&self, message: &str) {
        eprintln!();
        eprintln!("{}", "─".repeat(48).red());
        eprintln!("{}", message.red().bold());
        eprintln!("{}", "─".repeat(48).red());
    }
}
