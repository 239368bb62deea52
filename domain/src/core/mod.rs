//! Core domain concepts shared across all subdomains.
//!
//! - [`model::ModelId`] — the closed set of models a conversation can use
//! - [`error::DomainError`] — domain-level errors

pub mod error;
pub mod model;
