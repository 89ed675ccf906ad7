//! Raw push payload handling: show the system notification, then hand the
//! message to the delivery bridge.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use taskhub_core::types::TaskId;

use crate::error::NotifyResult;
use crate::notification::formatter::TITLE_GENERIC;
use crate::notification::notifier::{DEFAULT_ICON, DEFAULT_TAG, SystemNotifier, VisibleNotification};
use crate::notification::record::NotificationKind;

use super::delivery::DeliveryHandle;
use super::message::PushMessage;

/// Extra data carried by a push payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    #[serde(default, deserialize_with = "lenient_task_id")]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, alias = "followerUsername")]
    pub username: Option<String>,
}

/// Decrypted push payload as sent by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_icon")]
    pub badge: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub data: PushData,
}

fn default_title() -> String {
    TITLE_GENERIC.to_string()
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

/// Task ids arrive as numbers or numeric strings.
fn lenient_task_id<'de, D>(deserializer: D) -> Result<Option<TaskId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().map(TaskId::new),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

impl PushPayload {
    /// Parse a raw payload. Empty payloads yield `None`; text that is not a
    /// JSON object becomes the body of a default notification.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        match serde_json::from_slice::<Self>(raw) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(error = %e, "Push payload is not JSON, using it as text");
                Some(Self::text(String::from_utf8_lossy(raw).trim()))
            }
        }
    }

    /// Default notification with `body` as text.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            title: default_title(),
            body: body.into(),
            icon: default_icon(),
            badge: default_icon(),
            tag: default_tag(),
            data: PushData::default(),
        }
    }

    pub fn visible(&self) -> VisibleNotification {
        VisibleNotification {
            title: self.title.clone(),
            body: self.body.clone(),
            tag: self.tag.clone(),
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            url: self.data.url.clone(),
        }
    }

    pub fn message(&self) -> PushMessage {
        let kind = self
            .data
            .kind
            .as_deref()
            .map(NotificationKind::from_str_value)
            .unwrap_or_default();

        PushMessage::new(self.title.clone(), self.body.clone())
            .with_kind(kind)
            .with_task(self.data.task_id)
            .with_username(self.data.username.clone())
            .with_url(self.data.url.clone())
    }
}

/// Receives push payloads while the application may be in the background.
#[derive(Debug, Clone)]
pub struct PushReceiver {
    notifier: Arc<dyn SystemNotifier>,
    delivery: DeliveryHandle,
}

impl PushReceiver {
    pub fn new(notifier: Arc<dyn SystemNotifier>, delivery: DeliveryHandle) -> Self {
        Self { notifier, delivery }
    }

    /// Handle one raw payload. Returns `false` for an empty payload.
    pub async fn receive(&self, raw: &[u8]) -> NotifyResult<bool> {
        let Some(payload) = PushPayload::parse(raw) else {
            debug!("Ignoring empty push payload");
            return Ok(false);
        };
        self.receive_payload(payload).await?;
        Ok(true)
    }

    /// Handle an already parsed payload.
    pub async fn receive_payload(&self, payload: PushPayload) -> NotifyResult<()> {
        info!(tag = %payload.tag, "Push notification received");
        self.notifier.show(payload.visible());
        self.delivery.send(payload.message()).await
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::bridge::delivery;
    use crate::notification::notifier::TagCollapsingNotifier;
    use crate::notification::persistence::MemoryStorage;
    use crate::notification::store::NotificationStore;

    #[test]
    fn test_parse_applies_defaults() {
        let payload = PushPayload::parse(br#"{"body":"Tugas baru: IPA"}"#).expect("payload");
        assert_eq!(payload.title, "Notifikasi");
        assert_eq!(payload.icon, "/batik.png");
        assert_eq!(payload.badge, "/batik.png");
        assert_eq!(payload.tag, "default");
        assert_eq!(payload.data, PushData::default());
    }

    #[test]
    fn test_parse_reads_data() {
        let payload = PushPayload::parse(
            br#"{"title":"Tugas Baru","body":"IPA","tag":"task-4","data":{"taskId":"4","url":"/dashboard/4","type":"task_created"}}"#,
        )
        .expect("payload");
        let message = payload.message();
        assert_eq!(message.task_id, Some(TaskId::new(4)));
        assert_eq!(message.kind, NotificationKind::TaskCreated);
        assert_eq!(message.url.as_deref(), Some("/dashboard/4"));
        assert_eq!(payload.visible().tag, "task-4");
    }

    #[test]
    fn test_text_payload_becomes_body() {
        let payload = PushPayload::parse(b"Server maintenance tonight").expect("payload");
        assert_eq!(payload.title, "Notifikasi");
        assert_eq!(payload.body, "Server maintenance tonight");
        assert_eq!(payload.message().kind, NotificationKind::Generic);
    }

    #[test]
    fn test_empty_payload_is_ignored() {
        assert!(PushPayload::parse(b"").is_none());
        assert!(PushPayload::parse(b"  \n").is_none());
    }

    #[tokio::test]
    async fn test_receive_shows_then_delivers() {
        let store = Arc::new(NotificationStore::load(
            Arc::new(MemoryStorage::new()),
            "history",
            20,
        ));
        let notifier = Arc::new(TagCollapsingNotifier::new());
        let (handle, bridge) = delivery::channel(4, store.clone());
        let receiver = PushReceiver::new(notifier.clone(), handle);

        assert!(receiver.receive(br#"{"title":"A","tag":"t"}"#).await.expect("receive"));
        assert!(receiver.receive(br#"{"title":"B","tag":"t"}"#).await.expect("receive"));
        assert!(!receiver.receive(b"").await.expect("receive"));
        drop(receiver);

        assert_eq!(bridge.run(CancellationToken::new()).await, 2);
        assert_eq!(store.len(), 2);
        assert_eq!(notifier.visible().len(), 1);
        assert_eq!(notifier.get("t").map(|n| n.title), Some("B".to_string()));
        assert_eq!(notifier.shown_count(), 2);
    }
}
