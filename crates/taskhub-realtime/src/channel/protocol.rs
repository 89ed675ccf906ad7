//! Pusher channel protocol frames (as spoken by Laravel Reverb).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{NotifyError, NotifyResult};

pub const EVENT_CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
pub const EVENT_SUBSCRIBE: &str = "pusher:subscribe";
pub const EVENT_SUBSCRIPTION_SUCCEEDED: &str = "pusher_internal:subscription_succeeded";
pub const EVENT_ERROR: &str = "pusher:error";
pub const EVENT_PING: &str = "pusher:ping";
pub const EVENT_PONG: &str = "pusher:pong";

/// One text frame on the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PusherFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Object or JSON-encoded string, depending on the sender.
    #[serde(default)]
    pub data: Value,
}

impl PusherFrame {
    /// Parse a text frame.
    pub fn parse(text: &str) -> NotifyResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| NotifyError::Transport(format!("invalid frame: {e}")))
    }

    /// Serialize for sending.
    pub fn to_text(&self) -> NotifyResult<String> {
        serde_json::to_string(self)
            .map_err(|e| NotifyError::Transport(format!("failed to encode frame: {e}")))
    }

    /// `data` decoded when it was sent as a string.
    pub fn data_value(&self) -> Value {
        match &self.data {
            Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| self.data.clone()),
            other => other.clone(),
        }
    }

    /// Subscription request for a private channel.
    pub fn subscribe(channel: &str, auth: &str) -> Self {
        Self {
            event: EVENT_SUBSCRIBE.to_string(),
            channel: None,
            data: json!({ "auth": auth, "channel": channel }),
        }
    }

    pub fn ping() -> Self {
        Self {
            event: EVENT_PING.to_string(),
            channel: None,
            data: json!({}),
        }
    }

    pub fn pong() -> Self {
        Self {
            event: EVENT_PONG.to_string(),
            channel: None,
            data: json!({}),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EstablishedData {
    socket_id: String,
    #[serde(default)]
    activity_timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorData {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<u16>,
}

/// Server frames classified by meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    ConnectionEstablished {
        socket_id: String,
        /// Seconds of silence after which the client should ping.
        activity_timeout: Option<u64>,
    },
    SubscriptionSucceeded {
        channel: String,
    },
    Ping,
    Pong,
    Error {
        message: String,
        code: Option<u16>,
    },
    /// An application event on a channel.
    Event {
        name: String,
        channel: Option<String>,
        data: Value,
    },
}

impl ServerMessage {
    /// Classify a frame. Malformed protocol frames become `Error`.
    pub fn classify(frame: PusherFrame) -> Self {
        match frame.event.as_str() {
            EVENT_CONNECTION_ESTABLISHED => {
                match serde_json::from_value::<EstablishedData>(frame.data_value()) {
                    Ok(data) => Self::ConnectionEstablished {
                        socket_id: data.socket_id,
                        activity_timeout: data.activity_timeout,
                    },
                    Err(e) => Self::Error {
                        message: format!("malformed connection_established: {e}"),
                        code: None,
                    },
                }
            }
            EVENT_SUBSCRIPTION_SUCCEEDED => Self::SubscriptionSucceeded {
                channel: frame.channel.unwrap_or_default(),
            },
            EVENT_PING => Self::Ping,
            EVENT_PONG => Self::Pong,
            EVENT_ERROR => {
                let data: ErrorData =
                    serde_json::from_value(frame.data_value()).unwrap_or_default();
                Self::Error {
                    message: data.message.unwrap_or_else(|| "unknown error".to_string()),
                    code: data.code,
                }
            }
            _ => {
                let data = frame.data_value();
                Self::Event {
                    name: frame.event,
                    channel: frame.channel,
                    data,
                }
            }
        }
    }
}
