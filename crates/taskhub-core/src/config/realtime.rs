//! Real-time channel configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for the realtime (Pusher protocol) server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Whether the daemon opens the realtime channel at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Application key registered with the realtime server.
    #[serde(default = "default_app_key")]
    pub app_key: String,
    /// WebSocket host.
    #[serde(default = "default_host")]
    pub host: String,
    /// WebSocket port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// `"http"` for `ws://`, `"https"` for `wss://`.
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Private channel authorization endpoint.
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,
    /// Seconds allowed for connect + authorize + subscribe.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_seconds: u64,
    /// Fallback client ping interval when the server does not announce one.
    #[serde(default = "default_activity_timeout")]
    pub activity_timeout_seconds: u64,
    /// Buffer between the socket reader and the event pump.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
}

impl RealtimeConfig {
    /// WebSocket URL of the application endpoint.
    pub fn websocket_url(&self) -> String {
        let ws_scheme = if self.scheme.eq_ignore_ascii_case("https") {
            "wss"
        } else {
            "ws"
        };
        format!(
            "{ws_scheme}://{}:{}/app/{}?protocol=7&client=taskhub-notifier&version={}&flash=false",
            self.host,
            self.port,
            self.app_key,
            env!("CARGO_PKG_VERSION"),
        )
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_key: default_app_key(),
            host: default_host(),
            port: default_port(),
            scheme: default_scheme(),
            auth_endpoint: default_auth_endpoint(),
            handshake_timeout_seconds: default_handshake_timeout(),
            activity_timeout_seconds: default_activity_timeout(),
            channel_buffer_size: default_channel_buffer(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_app_key() -> String {
    "local-key".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_auth_endpoint() -> String {
    "http://localhost:8000/broadcasting/auth".to_string()
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_activity_timeout() -> u64 {
    30
}

fn default_channel_buffer() -> usize {
    256
}
