//! Terminal output for chat turns

pub mod console;
pub mod viewport;
