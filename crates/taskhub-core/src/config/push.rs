//! Native push platform configuration.

use serde::{Deserialize, Serialize};

/// Capabilities and state location of the native push platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Whether a background worker can be registered on this host.
    #[serde(default = "default_true")]
    pub worker_available: bool,
    /// Whether a push service is reachable from this host.
    #[serde(default = "default_true")]
    pub push_available: bool,
    /// Whether visible system notifications can be shown.
    #[serde(default = "default_true")]
    pub notifications_available: bool,
    /// Push service base URL under which subscription endpoints are minted.
    #[serde(default = "default_push_service_url")]
    pub push_service_url: String,
    /// Directory holding permission and subscription state.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Whether the permission prompt may be shown on the terminal.
    #[serde(default = "default_true")]
    pub interactive: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            worker_available: true,
            push_available: true,
            notifications_available: true,
            push_service_url: default_push_service_url(),
            data_dir: default_data_dir(),
            interactive: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_push_service_url() -> String {
    "https://push.taskhub.local/send".to_string()
}

fn default_data_dir() -> String {
    "data/push".to_string()
}
