//! Authentication settings used by the daemon.

use serde::{Deserialize, Serialize};

use crate::types::{AuthSession, UserId};

/// Identity the daemon runs as. Empty means "logged out".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Backend user id.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Bearer token issued by the backend.
    #[serde(default)]
    pub token: Option<String>,
}

impl AuthConfig {
    /// Session value handed to the notification context.
    pub fn session(&self) -> AuthSession {
        AuthSession {
            user_id: self.user_id.map(UserId::new),
            token: self.token.clone(),
        }
    }
}
