//! Identity port
//!
//! The identity provider has already verified the user; this port only reads
//! the result.

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    /// Session token forwarded to the chat API.
    pub token: Option<String>,
}

pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<AuthenticatedUser>;
}
