//! Notification history store configuration.

use serde::{Deserialize, Serialize};

/// Where and how much notification history is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of records retained.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Directory holding the persisted history.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Storage key of the history document.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            data_dir: default_data_dir(),
            storage_key: default_storage_key(),
        }
    }
}

fn default_capacity() -> usize {
    20
}

fn default_data_dir() -> String {
    "data/store".to_string()
}

fn default_storage_key() -> String {
    "notification_history".to_string()
}
