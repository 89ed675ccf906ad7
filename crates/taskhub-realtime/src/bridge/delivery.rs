//! Bounded queue from out-of-band producers into the notification store.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{NotifyError, NotifyResult};
use crate::notification::store::{AppendOutcome, NotificationStore};

use super::message::PushMessage;

/// Create a connected handle/bridge pair.
///
/// `capacity` bounds the number of queued messages; it is at least 1.
pub fn channel(
    capacity: usize,
    store: Arc<NotificationStore>,
) -> (DeliveryHandle, BackgroundDeliveryBridge) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        DeliveryHandle { tx },
        BackgroundDeliveryBridge { rx, store },
    )
}

/// Producer side; cheap to clone.
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    tx: mpsc::Sender<PushMessage>,
}

impl DeliveryHandle {
    /// Queue `message`, waiting for room.
    pub async fn send(&self, message: PushMessage) -> NotifyResult<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| NotifyError::BridgeClosed("delivery bridge has stopped".to_string()))
    }

    /// Queue `message` without waiting.
    pub fn try_send(&self, message: PushMessage) -> NotifyResult<()> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                NotifyError::BridgeClosed("delivery queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                NotifyError::BridgeClosed("delivery bridge has stopped".to_string())
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side: appends every message to the store in arrival order.
#[derive(Debug)]
pub struct BackgroundDeliveryBridge {
    rx: mpsc::Receiver<PushMessage>,
    store: Arc<NotificationStore>,
}

impl BackgroundDeliveryBridge {
    /// Deliver until cancelled or every handle is dropped.
    ///
    /// Messages already queued when cancellation arrives are still
    /// delivered. Returns the number of messages appended.
    pub async fn run(mut self, cancel: CancellationToken) -> usize {
        info!("Background delivery bridge started");
        let mut delivered = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Background delivery bridge cancelled");
                    break;
                }
                message = self.rx.recv() => match message {
                    Some(message) => {
                        if self.deliver(message).is_inserted() {
                            delivered += 1;
                        }
                    }
                    None => break,
                },
            }
        }

        self.rx.close();
        while let Ok(message) = self.rx.try_recv() {
            if self.deliver(message).is_inserted() {
                delivered += 1;
            }
        }

        info!(delivered, "Background delivery bridge stopped");
        delivered
    }

    fn deliver(&self, message: PushMessage) -> AppendOutcome {
        let record = message.into_record();
        let id = record.id.clone();
        let outcome = self.store.append(record);
        match &outcome {
            AppendOutcome::Inserted { .. } => debug!(%id, "Out-of-band notification recorded"),
            AppendOutcome::Duplicate => warn!(%id, "Out-of-band notification id collided"),
        }
        outcome
    }
}
