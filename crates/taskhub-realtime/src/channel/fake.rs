//! In-process transport for tests and offline runs.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{NotifyError, NotifyResult};

use super::transport::{ChannelRequest, RealtimeTransport, TransportFrame, TransportSession};

#[derive(Debug)]
struct OpenedSession {
    request: ChannelRequest,
    sender: mpsc::Sender<TransportFrame>,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct FakeTransportInner {
    sessions: Vec<OpenedSession>,
    fail_next: usize,
}

/// Transport whose sessions are driven by the test.
#[derive(Debug, Default)]
pub struct FakeTransport {
    inner: Mutex<FakeTransportInner>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` handshakes.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Requests of every successfully opened session, oldest first.
    pub fn opened(&self) -> Vec<ChannelRequest> {
        self.lock().sessions.iter().map(|s| s.request.clone()).collect()
    }

    /// Whether session `index` has been released.
    pub fn is_released(&self, index: usize) -> bool {
        self.lock()
            .sessions
            .get(index)
            .is_some_and(|s| s.cancel.is_cancelled())
    }

    /// Number of sessions not yet released.
    pub fn open_count(&self) -> usize {
        self.lock()
            .sessions
            .iter()
            .filter(|s| !s.cancel.is_cancelled())
            .count()
    }

    /// Push an event into the most recent session.
    pub async fn emit(&self, name: &str, data: Value) -> bool {
        self.push(TransportFrame::Event {
            name: name.to_string(),
            data,
        })
        .await
    }

    /// Push an arbitrary frame into the most recent session.
    pub async fn push(&self, frame: TransportFrame) -> bool {
        let sender = self.lock().sessions.last().map(|s| s.sender.clone());
        match sender {
            Some(sender) => sender.send(frame).await.is_ok(),
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeTransportInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RealtimeTransport for FakeTransport {
    async fn open(&self, request: &ChannelRequest) -> NotifyResult<TransportSession> {
        let mut inner = self.lock();
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(NotifyError::Transport("handshake rejected".to_string()));
        }

        let (sender, frames) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        inner.sessions.push(OpenedSession {
            request: request.clone(),
            sender,
            cancel: cancel.clone(),
        });
        Ok(TransportSession { frames, cancel })
    }
}
