//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod chat_turn;
pub mod load_conversation;
pub mod persist_turn;
