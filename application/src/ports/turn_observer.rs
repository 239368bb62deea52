//! Turn observer port
//!
//! Defines how the presentation layer is told about the turn in progress.
//! Observers only ever receive snapshots; they never mutate turn state.

use crate::use_cases::chat_turn::{TurnError, TurnWarning};
use chatline_domain::{StreamState, TurnPhase};

/// Callback for UI-state updates during a chat turn
///
/// Implementations live in the presentation layer.
pub trait TurnObserver: Send + Sync {
    /// Called after every applied delta and once more for the final flush.
    fn on_state(&self, _state: &StreamState) {}

    /// Called on every phase transition.
    fn on_phase(&self, _phase: TurnPhase) {}

    /// Called for non-fatal conditions the user should see.
    fn on_warning(&self, _warning: &TurnWarning) {}

    /// Called for turn errors, rendered inline next to the conversation.
    fn on_error(&self, _error: &TurnError) {}

    /// Called for errors that need acknowledgement before the user can continue.
    fn on_blocking_notice(&self, _message: &str) {}
}

/// No-op observer for when nothing renders the turn
pub struct NoTurnObserver;

impl TurnObserver for NoTurnObserver {}
