//! The realtime channel: one per-user connection feeding the dispatcher.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskhub_core::types::UserId;

use crate::notification::dispatcher::EventDispatcher;
use crate::notification::record::NotificationRecord;

use super::state::ConnectionState;
use super::transport::{ChannelRequest, RealtimeTransport, TransportFrame};
use super::types::ChannelName;

#[derive(Debug)]
struct ActiveConnection {
    user_id: UserId,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

/// Holds at most one subscribed user channel and pumps its events, in
/// receipt order, into the dispatcher.
///
/// `connect` and `disconnect` never fail; the outcome is observable through
/// [`RealtimeChannel::state`].
#[derive(Debug)]
pub struct RealtimeChannel {
    transport: Arc<dyn RealtimeTransport>,
    dispatcher: Arc<EventDispatcher>,
    state: Arc<watch::Sender<ConnectionState>>,
    active: Mutex<Option<ActiveConnection>>,
}

impl RealtimeChannel {
    pub fn new(transport: Arc<dyn RealtimeTransport>, dispatcher: Arc<EventDispatcher>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            dispatcher,
            state: Arc::new(state),
            active: Mutex::new(None),
        }
    }

    /// Subscribe the private channel of `user_id`.
    ///
    /// No-op when already connected for the same user. A connection for a
    /// different user is torn down first. Returns whether the channel is
    /// connected afterwards.
    pub async fn connect(&self, user_id: UserId, token: &str) -> bool {
        let mut active = self.active.lock().await;

        if let Some(conn) = active.as_ref() {
            if conn.user_id == user_id && self.is_connected() {
                debug!(user_id = %user_id, "Realtime channel already connected");
                return true;
            }
        }

        if let Some(conn) = active.take() {
            info!(previous = %conn.user_id, next = %user_id, "Replacing realtime connection");
            Self::teardown(conn).await;
        }

        self.state.send_replace(ConnectionState::Connecting);

        let request = ChannelRequest::for_user_channel(ChannelName::for_user(user_id), token);
        match self.transport.open(&request).await {
            Ok(session) => {
                self.state.send_replace(ConnectionState::Connected);
                info!(channel = %request.channel, "Realtime channel connected");

                let pump = tokio::spawn(pump_events(
                    session.frames,
                    session.cancel.clone(),
                    self.dispatcher.clone(),
                    self.state.clone(),
                ));
                *active = Some(ActiveConnection {
                    user_id,
                    cancel: session.cancel,
                    pump,
                });
                true
            }
            Err(e) => {
                warn!(channel = %request.channel, error = %e, "Realtime handshake failed");
                self.state.send_replace(ConnectionState::Disconnected);
                false
            }
        }
    }

    /// Release the connection, if any.
    pub async fn disconnect(&self) {
        let mut active = self.active.lock().await;
        if let Some(conn) = active.take() {
            info!(user_id = %conn.user_id, "Disconnecting realtime channel");
            Self::teardown(conn).await;
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// Whether the channel is currently connected.
    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver for connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// User whose channel is held, connected or not.
    pub async fn current_user(&self) -> Option<UserId> {
        self.active.lock().await.as_ref().map(|c| c.user_id)
    }

    /// Most recent notification received over this channel.
    pub fn last_notification(&self) -> Option<NotificationRecord> {
        self.dispatcher.last_notification()
    }

    async fn teardown(conn: ActiveConnection) {
        conn.cancel.cancel();
        if let Err(e) = conn.pump.await {
            warn!(error = %e, "Realtime pump ended abnormally");
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(conn) = self.active.get_mut().take() {
            conn.cancel.cancel();
        }
    }
}

/// Handles frames strictly one at a time until the session ends or is
/// cancelled. Cancellation leaves the state to the canceller.
async fn pump_events(
    mut frames: mpsc::Receiver<TransportFrame>,
    cancel: CancellationToken,
    dispatcher: Arc<EventDispatcher>,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            frame = frames.recv() => frame,
        };

        match frame {
            Some(TransportFrame::Event { name, data }) => {
                dispatcher.dispatch(&name, &data).await;
            }
            Some(TransportFrame::Closed) | None => {
                state.send_replace(ConnectionState::Disconnected);
                return;
            }
            Some(TransportFrame::Error(e)) => {
                warn!(error = %e, "Realtime transport error");
                state.send_replace(ConnectionState::Error);
                return;
            }
        }
    }
}
