//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure and presentation adapters
//! must implement.

pub mod chat_repository;
pub mod conversation_cache;
pub mod conversation_logger;
pub mod identity;
pub mod provider;
pub mod turn_observer;
pub mod viewport;
