//! Remote notification registry (push subscription backend) configuration.

use serde::{Deserialize, Serialize};

/// REST endpoints of the notification registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Backend origin, without the API prefix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Prefix of the JSON API routes.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Path of the public VAPID key route, relative to `base_url`.
    #[serde(default = "default_vapid_key_path")]
    pub vapid_key_path: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Maximum subscribe attempts.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Backoff step; attempt `n` waits `n * retry_delay_ms` before the next one.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl RegistryConfig {
    /// Full URL of an API route such as `/notifications/subscribe`.
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix,
            path
        )
    }

    /// Full URL of the VAPID key route.
    pub fn vapid_key_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.vapid_key_path
        )
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            vapid_key_path: default_vapid_key_path(),
            timeout_seconds: default_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_vapid_key_path() -> String {
    "/vapid-key".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}
