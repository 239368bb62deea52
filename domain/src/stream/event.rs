//! Streaming events for provider responses.
//!
//! [`StreamEvent`] is the canonical incremental-text model every provider
//! protocol is normalized into.

/// An event in a streaming provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment. May be empty; empty fragments carry no text and are
    /// not separators.
    Delta(String),
    /// Natural end of the stream.
    Completed,
    /// Terminal provider or transport failure.
    Error(String),
}

impl StreamEvent {
    /// Returns the text if this is a Delta event.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::Delta(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this event signals the end of the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed | StreamEvent::Error(_))
    }
}
