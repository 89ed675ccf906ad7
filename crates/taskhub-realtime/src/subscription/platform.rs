//! Capability-probe interface over the host's push platform.

use std::fmt::{self, Debug};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NotifyResult;

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// The user has not been asked yet.
    #[default]
    Default,
    /// Notifications are allowed.
    Granted,
    /// Notifications are blocked.
    Denied,
}

impl PermissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which platform facilities exist on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilities {
    /// A background worker can be registered.
    pub worker: bool,
    /// A push service is available.
    pub push: bool,
    /// Visible notifications can be shown.
    pub notifications: bool,
}

impl PlatformCapabilities {
    /// All capabilities present.
    pub fn full() -> Self {
        Self {
            worker: true,
            push: true,
            notifications: true,
        }
    }

    /// No capability present.
    pub fn none() -> Self {
        Self {
            worker: false,
            push: false,
            notifications: false,
        }
    }

    /// Push notifications need all three.
    pub fn is_supported(&self) -> bool {
        self.worker && self.push && self.notifications
    }
}

/// Key material of a push subscription, URL-safe base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// 16-byte authentication secret.
    pub auth: String,
    /// Uncompressed P-256 public key.
    pub p256dh: String,
}

/// A push subscription created by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// URL the push service delivers to.
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

/// Host push platform: worker registration, permission and subscriptions.
#[async_trait]
pub trait PushPlatform: Send + Sync + Debug {
    /// Capabilities of the host. Must not have side effects.
    fn capabilities(&self) -> PlatformCapabilities;

    /// Current permission. Always re-read from the platform.
    async fn permission(&self) -> PermissionState;

    /// Show the one-time permission prompt and return the answer.
    async fn prompt_permission(&self) -> NotifyResult<PermissionState>;

    /// Register (or re-register) the background worker.
    async fn register_worker(&self) -> NotifyResult<()>;

    /// Existing local subscription, if any.
    async fn get_subscription(&self) -> NotifyResult<Option<PushSubscription>>;

    /// Create a subscription bound to `application_server_key`.
    async fn subscribe(&self, application_server_key: &[u8]) -> NotifyResult<PushSubscription>;

    /// Remove the local subscription. Returns `false` when none existed.
    async fn unsubscribe(&self) -> NotifyResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_support_needs_every_capability() {
        assert!(PlatformCapabilities::full().is_supported());
        assert!(!PlatformCapabilities::none().is_supported());
        let no_push = PlatformCapabilities {
            push: false,
            ..PlatformCapabilities::full()
        };
        assert!(!no_push.is_supported());
    }

    #[test]
    fn test_permission_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PermissionState::Granted).expect("serialize"),
            "\"granted\""
        );
        assert_eq!(PermissionState::default(), PermissionState::Default);
    }
}
