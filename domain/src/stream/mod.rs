//! Streaming turn domain.
//!
//! - [`event::StreamEvent`] — canonical incremental-text event
//! - [`state::StreamState`] / [`state::TurnPhase`] — per-turn UI state
//! - [`scroll`] — scroll anchoring value objects

pub mod event;
pub mod scroll;
pub mod state;
