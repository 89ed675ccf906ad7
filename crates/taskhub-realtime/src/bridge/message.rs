//! Out-of-band message handed to the delivery bridge.

use serde::{Deserialize, Serialize};

use taskhub_core::types::TaskId;

use crate::notification::formatter::TITLE_GENERIC;
use crate::notification::record::{NotificationId, NotificationKind, NotificationRecord};

/// A notification delivered outside the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, alias = "notificationType", alias = "type")]
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, alias = "followerUsername", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Page the notification points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            kind: NotificationKind::Generic,
            task_id: None,
            username: None,
            url: None,
        }
    }

    pub fn with_kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_task(mut self, task_id: Option<TaskId>) -> Self {
        self.task_id = task_id;
        self
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    /// History record under a freshly generated id.
    pub fn into_record(self) -> NotificationRecord {
        let title = if self.title.trim().is_empty() {
            TITLE_GENERIC.to_string()
        } else {
            self.title
        };
        NotificationRecord::new(NotificationId::generate(), self.kind, title, self.body)
            .with_task(self.task_id)
            .with_username(self.username)
            .with_url(self.url.filter(|u| !u.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_record_uses_fresh_ids() {
        let message = PushMessage::new("Tugas Baru", "Matematika")
            .with_kind(NotificationKind::TaskCreated)
            .with_task(Some(TaskId::new(7)));

        let first = message.clone().into_record();
        let second = message.into_record();

        assert_ne!(first.id, second.id);
        assert_eq!(first.kind, NotificationKind::TaskCreated);
        assert_eq!(first.related_task_id, Some(TaskId::new(7)));
        assert!(!first.read);
    }

    #[test]
    fn test_into_record_keeps_url() {
        let record = PushMessage::new("Tugas Baru", "IPA")
            .with_url(Some("/dashboard/9".to_string()))
            .into_record();
        assert_eq!(record.url.as_deref(), Some("/dashboard/9"));

        let blank = PushMessage::new("Tugas Baru", "IPA")
            .with_url(Some(" ".to_string()))
            .into_record();
        assert_eq!(blank.url, None);
    }

    #[test]
    fn test_blank_title_falls_back() {
        let record = PushMessage::new("  ", "hello").into_record();
        assert_eq!(record.title, TITLE_GENERIC);
        assert_eq!(record.body, "hello");
    }

    #[test]
    fn test_accepts_legacy_client_fields() {
        let message: PushMessage = serde_json::from_str(
            r#"{"title":"Follower Baru!","body":"budi","notificationType":"user_followed","followerUsername":"budi"}"#,
        )
        .expect("parse");
        assert_eq!(message.kind, NotificationKind::UserFollowed);
        assert_eq!(message.username.as_deref(), Some("budi"));
    }
}
