//! Event dispatcher: routes realtime events to the store and the system notifier.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing;

use crate::channel::event::RealtimeEvent;
use crate::channel::types::EventName;
use crate::subscription::platform::PushPlatform;

use super::formatter::NotificationFormatter;
use super::notifier::SystemNotifier;
use super::record::NotificationRecord;
use super::store::{AppendOutcome, NotificationStore};

/// Turns realtime events into history records and visible notifications.
#[derive(Debug)]
pub struct EventDispatcher {
    /// Shared history
    store: Arc<NotificationStore>,
    /// Permission source
    platform: Arc<dyn PushPlatform>,
    /// Visible notification sink
    notifier: Arc<dyn SystemNotifier>,
    /// Most recently appended realtime record
    last_notification: watch::Sender<Option<NotificationRecord>>,
}

impl EventDispatcher {
    /// Create a new dispatcher
    pub fn new(
        store: Arc<NotificationStore>,
        platform: Arc<dyn PushPlatform>,
        notifier: Arc<dyn SystemNotifier>,
    ) -> Self {
        let (last_notification, _) = watch::channel(None);
        Self {
            store,
            platform,
            notifier,
            last_notification,
        }
    }

    /// Handle one event frame.
    ///
    /// Unknown event names and malformed payloads are logged and dropped.
    /// A visible notification is requested only for newly appended records
    /// and only while permission is granted.
    pub async fn dispatch(&self, name: &str, data: &Value) -> Option<AppendOutcome> {
        let Some(event_name) = EventName::parse(name) else {
            tracing::trace!("Ignoring unlistened event '{}'", name);
            return None;
        };

        let event = match RealtimeEvent::decode(event_name, data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(event = %event_name, error = %e, "Dropping realtime event");
                return None;
            }
        };

        Some(self.dispatch_event(&event).await)
    }

    /// Handle an already decoded event.
    pub async fn dispatch_event(&self, event: &RealtimeEvent) -> AppendOutcome {
        let record = NotificationFormatter::record(event);
        let outcome = self.store.append(record.clone());

        // A redelivered id was shown when first recorded; it stays silent.
        if !outcome.is_inserted() {
            tracing::debug!(id = %record.id, "Realtime event already recorded");
            return outcome;
        }

        tracing::info!(
            id = %record.id,
            kind = %record.kind,
            "Realtime notification recorded"
        );
        self.last_notification.send_replace(Some(record));

        let permission = self.platform.permission().await;
        if permission.is_granted() {
            self.notifier.show(NotificationFormatter::visible(event));
        } else {
            tracing::debug!(permission = %permission, "System notification suppressed");
        }

        outcome
    }

    /// Most recently recorded realtime notification.
    pub fn last_notification(&self) -> Option<NotificationRecord> {
        self.last_notification.borrow().clone()
    }

    /// Receiver for `last_notification` changes.
    pub fn watch_last(&self) -> watch::Receiver<Option<NotificationRecord>> {
        self.last_notification.subscribe()
    }

    /// The store this dispatcher appends to.
    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }
}
