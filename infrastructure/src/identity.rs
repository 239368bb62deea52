//! Identity supplied up front (configuration or environment).

use chatline_application::{AuthenticatedUser, IdentityProvider};

/// Identity fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<AuthenticatedUser>,
}

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            user: Some(AuthenticatedUser {
                user_id: user_id.into(),
                token,
            }),
        }
    }

    /// No signed-in user.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<AuthenticatedUser> {
        self.user.clone()
    }
}
