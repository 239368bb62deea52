//! Conversation domain.
//!
//! - [`entities::Conversation`] — a persisted chat session and its history
//! - [`attachment::PendingAttachment`] — an image attached to the next message
//! - [`mapping`] — history → provider request conversion
//! - [`idempotency::IdempotencyKey`] — per-turn commit key

pub mod attachment;
pub mod entities;
pub mod idempotency;
pub mod mapping;
