//! Authentication session consumed from the host application.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Snapshot of the host's authentication state.
///
/// The notifier never authenticates on its own; it reacts to changes of
/// this value (login, logout, account switch).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Authenticated user, if any.
    pub user_id: Option<UserId>,
    /// Bearer token used for registry calls and channel authorization.
    pub token: Option<String>,
}

impl AuthSession {
    /// Session for an authenticated user.
    pub fn authenticated(user_id: UserId, token: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            token: Some(token.into()),
        }
    }

    /// Logged-out session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Whether a user is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some() && self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_not_authenticated() {
        let session = AuthSession {
            user_id: Some(UserId::new(1)),
            token: Some(String::new()),
        };
        assert!(!session.is_authenticated());
        assert!(AuthSession::authenticated(UserId::new(1), "t").is_authenticated());
        assert!(!AuthSession::anonymous().is_authenticated());
    }
}
