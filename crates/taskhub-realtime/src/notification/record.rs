//! Notification record model and id generation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taskhub_core::types::TaskId;

/// Process-wide sequence appended to generated ids.
static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Opaque notification identifier, unique within the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    /// Wrap an id supplied by a producer (e.g. an event timestamp).
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generate a fresh id: `<unix millis>-<sequence>`.
    ///
    /// The sequence keeps ids distinct when two records arrive within the
    /// same millisecond.
    pub fn generate() -> Self {
        let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}-{}", Utc::now().timestamp_millis(), seq))
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A teacher published a task.
    TaskCreated,
    /// A student handed a task in.
    TaskSubmitted,
    /// Someone followed the user.
    UserFollowed,
    /// Anything else.
    #[default]
    #[serde(other)]
    Generic,
}

impl NotificationKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCreated => "task_created",
            Self::TaskSubmitted => "task_submitted",
            Self::UserFollowed => "user_followed",
            Self::Generic => "generic",
        }
    }

    /// Parse a wire name; unknown names map to `Generic`.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "task_created" => Self::TaskCreated,
            "task_submitted" => Self::TaskSubmitted,
            "user_followed" => Self::UserFollowed,
            _ => Self::Generic,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the notification history.
///
/// Serialized in camelCase with an RFC 3339 `createdAt`. The aliases accept
/// the field names written by the web client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Unique id.
    pub id: NotificationId,
    /// Display title.
    pub title: String,
    /// Display body.
    #[serde(default)]
    pub body: String,
    /// Kind of event.
    #[serde(default, alias = "type")]
    pub kind: NotificationKind,
    /// Related task, for task kinds.
    #[serde(default, alias = "taskId", skip_serializing_if = "Option::is_none")]
    pub related_task_id: Option<TaskId>,
    /// Related user, for `user_followed`.
    #[serde(
        default,
        alias = "followerUsername",
        skip_serializing_if = "Option::is_none"
    )]
    pub related_username: Option<String>,
    /// Page named by an out-of-band push, opened instead of the derived route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Client-side receipt time.
    #[serde(alias = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Whether the user has seen it.
    #[serde(default)]
    pub read: bool,
}

impl NotificationRecord {
    /// New unread record received now.
    pub fn new(
        id: NotificationId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            kind,
            related_task_id: None,
            related_username: None,
            url: None,
            created_at: Utc::now(),
            read: false,
        }
    }

    /// Attach a related task.
    pub fn with_task(mut self, task_id: Option<TaskId>) -> Self {
        self.related_task_id = task_id;
        self
    }

    /// Attach a related username.
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.related_username = username;
        self
    }

    /// Attach the page a push pointed at.
    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    /// Override the receipt time.
    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = NotificationId::generate();
        let b = NotificationId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_serializes_camel_case_iso() {
        let at = DateTime::parse_from_rfc3339("2025-03-01T08:30:00Z")
            .expect("valid")
            .with_timezone(&Utc);
        let record = NotificationRecord::new("e1".into(), NotificationKind::TaskCreated, "T", "B")
            .with_task(Some(TaskId::new(42)))
            .received_at(at);

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["relatedTaskId"], 42);
        assert_eq!(json["kind"], "task_created");
        assert_eq!(json["createdAt"], "2025-03-01T08:30:00Z");
        assert!(json.get("relatedUsername").is_none());
    }

    #[test]
    fn test_reads_legacy_client_shape() {
        let legacy = r#"{
            "id": "1712000000000",
            "title": "Follower Baru!",
            "body": "budi mulai mengikuti kamu",
            "followerUsername": "budi",
            "type": "user_followed",
            "timestamp": "2024-04-01T10:00:00.000Z",
            "read": true
        }"#;
        let record: NotificationRecord = serde_json::from_str(legacy).expect("parse");
        assert_eq!(record.kind, NotificationKind::UserFollowed);
        assert_eq!(record.related_username.as_deref(), Some("budi"));
        assert!(record.read);
    }

    #[test]
    fn test_unknown_kind_is_generic() {
        let record: NotificationRecord = serde_json::from_str(
            r#"{"id":"x","title":"t","kind":"reminder","createdAt":"2024-01-01T00:00:00Z"}"#,
        )
        .expect("parse");
        assert_eq!(record.kind, NotificationKind::Generic);
        assert!(!record.read);
    }
}
