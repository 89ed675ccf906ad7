//! Pusher-protocol transport over `tokio-tungstenite`.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use taskhub_core::config::RealtimeConfig;

use crate::error::{NotifyError, NotifyResult};

use super::protocol::{PusherFrame, ServerMessage};
use super::transport::{ChannelRequest, RealtimeTransport, TransportFrame, TransportSession};
use super::types::EventName;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    auth: String,
}

/// Connects to a Pusher-compatible server and subscribes one private channel.
#[derive(Debug, Clone)]
pub struct PusherTransport {
    config: RealtimeConfig,
    http: reqwest::Client,
}

impl PusherTransport {
    pub fn new(config: RealtimeConfig) -> NotifyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.handshake_timeout_seconds.max(1)))
            .build()
            .map_err(|e| NotifyError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Obtain the channel signature from the authorization endpoint.
    async fn authorize(&self, socket_id: &str, channel: &str, token: &str) -> NotifyResult<String> {
        let response = self
            .http
            .post(&self.config.auth_endpoint)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&serde_json::json!({
                "socket_id": socket_id,
                "channel_name": channel,
            }))
            .send()
            .await
            .map_err(|e| NotifyError::Transport(format!("channel authorization failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Transport(format!(
                "channel authorization rejected with {status}"
            )));
        }

        let body: AuthResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::Transport(format!("invalid authorization response: {e}")))?;
        Ok(body.auth)
    }

    /// Connect, authorize and subscribe. Returns the socket and the
    /// server's activity timeout.
    async fn handshake(&self, request: &ChannelRequest) -> NotifyResult<(WsStream, Duration)> {
        let url = self.config.websocket_url();
        debug!(url = %url, "Connecting to realtime server");

        let (mut ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| NotifyError::Transport(format!("connect failed: {e}")))?;

        let (socket_id, activity_timeout) = loop {
            match next_message(&mut ws).await? {
                ServerMessage::ConnectionEstablished {
                    socket_id,
                    activity_timeout,
                } => break (socket_id, activity_timeout),
                ServerMessage::Ping => send_frame(&mut ws, &PusherFrame::pong()).await?,
                ServerMessage::Error { message, code } => {
                    return Err(NotifyError::Transport(format!(
                        "server error {code:?}: {message}"
                    )));
                }
                other => trace!("Ignoring frame before connection: {:?}", other),
            }
        };

        let channel = request.channel.wire_name();
        let auth = self.authorize(&socket_id, &channel, &request.token).await?;
        send_frame(&mut ws, &PusherFrame::subscribe(&channel, &auth)).await?;

        loop {
            match next_message(&mut ws).await? {
                ServerMessage::SubscriptionSucceeded { channel: confirmed }
                    if confirmed == channel =>
                {
                    break;
                }
                ServerMessage::Ping => send_frame(&mut ws, &PusherFrame::pong()).await?,
                ServerMessage::Error { message, code } => {
                    return Err(NotifyError::Transport(format!(
                        "subscription to {channel} failed {code:?}: {message}"
                    )));
                }
                other => trace!("Ignoring frame before subscription: {:?}", other),
            }
        }

        let activity = activity_timeout
            .unwrap_or(self.config.activity_timeout_seconds)
            .max(1);
        Ok((ws, Duration::from_secs(activity)))
    }
}

#[async_trait]
impl RealtimeTransport for PusherTransport {
    async fn open(&self, request: &ChannelRequest) -> NotifyResult<TransportSession> {
        let timeout = Duration::from_secs(self.config.handshake_timeout_seconds.max(1));
        let (ws, activity) = tokio::time::timeout(timeout, self.handshake(request))
            .await
            .map_err(|_| NotifyError::Transport("handshake timed out".to_string()))??;

        info!(channel = %request.channel, "Subscribed to realtime channel");

        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size.max(1));
        let cancel = CancellationToken::new();
        tokio::spawn(run_session(
            ws,
            tx,
            cancel.clone(),
            activity,
            request.channel.wire_name(),
            request.events.clone(),
        ));

        Ok(TransportSession {
            frames: rx,
            cancel,
        })
    }
}

async fn send_frame(ws: &mut WsStream, frame: &PusherFrame) -> NotifyResult<()> {
    let text = frame.to_text()?;
    ws.send(Message::text(text))
        .await
        .map_err(|e| NotifyError::Transport(format!("send failed: {e}")))
}

/// Next protocol message during the handshake. A closed socket is an error.
async fn next_message(ws: &mut WsStream) -> NotifyResult<ServerMessage> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame = PusherFrame::parse(text.as_str())?;
                return Ok(ServerMessage::classify(frame));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(NotifyError::Transport(
                    "connection closed during handshake".to_string(),
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(NotifyError::Transport(format!("read failed: {e}"))),
        }
    }
}

/// Reads the socket until cancelled or closed, forwarding listened events
/// in receipt order.
async fn run_session(
    mut ws: WsStream,
    tx: mpsc::Sender<TransportFrame>,
    cancel: CancellationToken,
    activity: Duration,
    channel: String,
    events: Vec<EventName>,
) {
    let idle = tokio::time::sleep(activity);
    tokio::pin!(idle);
    let mut awaiting_pong = false;

    let end = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                let _ = ws.close(None).await;
                debug!(channel = %channel, "Realtime session cancelled");
                return;
            }

            _ = &mut idle => {
                if awaiting_pong {
                    break TransportFrame::Error("pong timeout".to_string());
                }
                if let Err(e) = send_frame(&mut ws, &PusherFrame::ping()).await {
                    break TransportFrame::Error(e.to_string());
                }
                awaiting_pong = true;
                idle.as_mut().reset(tokio::time::Instant::now() + activity);
            }

            msg = ws.next() => {
                idle.as_mut().reset(tokio::time::Instant::now() + activity);
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let frame = match PusherFrame::parse(text.as_str()) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!("Skipping frame: {}", e);
                                continue;
                            }
                        };
                        match ServerMessage::classify(frame) {
                            ServerMessage::Ping => {
                                if let Err(e) = send_frame(&mut ws, &PusherFrame::pong()).await {
                                    break TransportFrame::Error(e.to_string());
                                }
                            }
                            ServerMessage::Pong => awaiting_pong = false,
                            ServerMessage::Error { message, code } => {
                                warn!(code = ?code, "Realtime server error: {}", message);
                            }
                            ServerMessage::Event { name, channel: on, data } => {
                                let listened = EventName::parse(&name)
                                    .is_some_and(|e| events.contains(&e));
                                if !listened || on.as_deref() != Some(channel.as_str()) {
                                    trace!("Ignoring event '{}'", name);
                                    continue;
                                }
                                if tx.send(TransportFrame::Event { name, data }).await.is_err() {
                                    let _ = ws.close(None).await;
                                    return;
                                }
                            }
                            ServerMessage::ConnectionEstablished { .. }
                            | ServerMessage::SubscriptionSucceeded { .. } => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break TransportFrame::Closed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break TransportFrame::Error(format!("read failed: {e}")),
                }
            }
        }
    };

    match &end {
        TransportFrame::Closed => info!(channel = %channel, "Realtime connection closed"),
        TransportFrame::Error(e) => warn!(channel = %channel, error = %e, "Realtime connection lost"),
        TransportFrame::Event { .. } => {}
    }
    let _ = tx.send(end).await;
}
