//! Background delivery bridge configuration.

use serde::{Deserialize, Serialize};

/// Settings of the out-of-band delivery path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Capacity of the inbound message queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Local address for the push ingress; disabled when unset.
    #[serde(default)]
    pub listen_addr: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            listen_addr: None,
        }
    }
}

fn default_queue_capacity() -> usize {
    64
}
