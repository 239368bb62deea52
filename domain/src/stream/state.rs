//! Per-turn stream state

/// Phase of the chat-turn state machine.
///
/// `Idle → Submitting → Streaming → Persisting → Idle`; any failure returns
/// to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    Submitting,
    Streaming,
    Persisting,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Submitting => "submitting",
            TurnPhase::Streaming => "streaming",
            TurnPhase::Persisting => "persisting",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, TurnPhase::Idle)
    }
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ephemeral UI state of the turn being generated.
///
/// Lives only in memory for one turn. Rendering reads clones of it; only the
/// turn controller and its collaborators mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamState {
    pub pending_question: Option<String>,
    pub accumulated_answer: String,
    /// Typing indicator.
    pub is_streaming: bool,
    pub has_user_manually_scrolled: bool,
}

impl StreamState {
    /// State for a newly submitted turn.
    pub fn begin(question: Option<String>) -> Self {
        Self {
            pending_question: question,
            accumulated_answer: String::new(),
            is_streaming: true,
            has_user_manually_scrolled: false,
        }
    }

    /// Append a fragment. The answer only ever grows.
    pub fn append(&mut self, fragment: &str) {
        self.accumulated_answer.push_str(fragment);
    }

    /// Clear the typing indicator without touching any text.
    pub fn stop_streaming(&mut self) {
        self.is_streaming = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.pending_question.is_none() && self.accumulated_answer.is_empty() && !self.is_streaming
    }
}
