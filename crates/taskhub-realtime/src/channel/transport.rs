//! Transport seam between the realtime channel and the wire protocol.

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::NotifyResult;

use super::types::{ChannelName, EventName};

/// What the channel asks the transport to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    /// Private channel to subscribe.
    pub channel: ChannelName,
    /// Bearer token for channel authorization.
    pub token: String,
    /// Events to forward; everything else is dropped by the transport.
    pub events: Vec<EventName>,
}

impl ChannelRequest {
    /// Request for the user channel with every listened event.
    pub fn for_user_channel(channel: ChannelName, token: impl Into<String>) -> Self {
        Self {
            channel,
            token: token.into(),
            events: EventName::ALL.to_vec(),
        }
    }
}

/// One item produced by an open session, in receipt order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFrame {
    /// A listened event and its payload.
    Event {
        name: String,
        data: Value,
    },
    /// The server closed the connection cleanly.
    Closed,
    /// The connection failed.
    Error(String),
}

/// A subscribed channel. Cancelling `cancel` releases the connection.
#[derive(Debug)]
pub struct TransportSession {
    pub frames: mpsc::Receiver<TransportFrame>,
    pub cancel: CancellationToken,
}

/// Opens authenticated channel subscriptions.
#[async_trait]
pub trait RealtimeTransport: Send + Sync + Debug {
    /// Connect, authorize and subscribe.
    ///
    /// Resolves once the subscription is confirmed; an error means the
    /// handshake failed and no connection is held.
    async fn open(&self, request: &ChannelRequest) -> NotifyResult<TransportSession>;
}
