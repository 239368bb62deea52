//! Terminal-backed viewport

use chatline_application::ViewPort;
use chatline_domain::{ScrollTarget, ViewportMetrics};
use std::io::Write;

/// The terminal as the conversation view.
///
/// Output is appended at the cursor, so the latest content is always the
/// last visible row; bringing it into view means flushing what is buffered.
pub struct TerminalViewport;

impl ViewPort for TerminalViewport {
    fn metrics(&self) -> ViewportMetrics {
        match crossterm::terminal::size() {
            Ok((_, rows)) => ViewportMetrics::new(rows as f32, rows as f32),
            Err(_) => ViewportMetrics::default(),
        }
    }

    fn scroll_into_view(&self, target: ScrollTarget) {
        match target {
            ScrollTarget::EndOfConversation => {
                let _ = std::io::stdout().flush();
            }
        }
    }
}
