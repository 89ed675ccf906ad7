//! Realtime event payloads and their typed form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use taskhub_core::types::{TaskId, UserId};

use crate::error::{NotifyError, NotifyResult};

use super::types::EventName;

/// Task fields carried by task events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Task id.
    pub id: TaskId,
    /// Task title.
    #[serde(rename = "judul", default)]
    pub title: String,
    /// Task description.
    #[serde(rename = "deskripsi", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Deadline as sent by the backend.
    #[serde(
        rename = "tanggal_deadline",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<String>,
    /// Audience of the task.
    #[serde(default)]
    pub target: String,
}

/// Follower fields carried by follow events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerSummary {
    /// Follower's user id.
    pub id: UserId,
    /// Follower's username.
    #[serde(default)]
    pub username: String,
    /// Follower's display name.
    #[serde(default)]
    pub name: String,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Raw event body: `{type, task?, follower?, message, timestamp}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Backend event type, e.g. `task_created`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Task, for task events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskSummary>,
    /// Follower, for follow events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower: Option<FollowerSummary>,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Server timestamp; used as the record id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A decoded realtime event, each variant carrying only its own fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// A task was published.
    TaskCreated {
        task: TaskSummary,
        message: String,
        timestamp: Option<String>,
    },
    /// A task was handed in.
    TaskSubmitted {
        task: TaskSummary,
        message: String,
        timestamp: Option<String>,
    },
    /// Someone followed the user.
    UserFollowed {
        follower: FollowerSummary,
        message: String,
        timestamp: Option<String>,
    },
    /// A listened event whose subject was missing from the payload.
    Generic {
        /// Event the payload arrived under.
        source: EventName,
        message: String,
        timestamp: Option<String>,
    },
}

impl RealtimeEvent {
    /// Decode the payload of event `name`.
    ///
    /// `data` may be the JSON object itself or a string containing it. An
    /// event whose task or follower is missing decodes as `Generic`.
    pub fn decode(name: EventName, data: &Value) -> NotifyResult<Self> {
        let payload: EventPayload = match data {
            Value::String(raw) => serde_json::from_str(raw),
            other => serde_json::from_value(other.clone()),
        }
        .map_err(|e| NotifyError::Transport(format!("malformed {name} payload: {e}")))?;

        Ok(Self::from_payload(name, payload))
    }

    /// Classify an already parsed payload.
    pub fn from_payload(name: EventName, payload: EventPayload) -> Self {
        let EventPayload {
            task,
            follower,
            message,
            timestamp,
            ..
        } = payload;

        match (name, task, follower) {
            (EventName::TaskCreated, Some(task), _) => Self::TaskCreated {
                task,
                message,
                timestamp,
            },
            (EventName::TaskSubmitted, Some(task), _) => Self::TaskSubmitted {
                task,
                message,
                timestamp,
            },
            (EventName::UserFollowed, _, Some(follower)) => Self::UserFollowed {
                follower,
                message,
                timestamp,
            },
            (source, _, _) => Self::Generic {
                source,
                message,
                timestamp,
            },
        }
    }

    /// Server timestamp of the event, if any.
    pub fn timestamp(&self) -> Option<&str> {
        match self {
            Self::TaskCreated { timestamp, .. }
            | Self::TaskSubmitted { timestamp, .. }
            | Self::UserFollowed { timestamp, .. }
            | Self::Generic { timestamp, .. } => timestamp.as_deref(),
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        match self {
            Self::TaskCreated { message, .. }
            | Self::TaskSubmitted { message, .. }
            | Self::UserFollowed { message, .. }
            | Self::Generic { message, .. } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decodes_task_created_object() {
        let data = json!({
            "type": "task_created",
            "task": {"id": 42, "judul": "Esai Sejarah", "target": "kelas-7a"},
            "message": "Tugas baru dari Bu Sari",
            "timestamp": "2025-03-01T08:30:00.000000Z"
        });

        let event = RealtimeEvent::decode(EventName::TaskCreated, &data).expect("decode");
        match event {
            RealtimeEvent::TaskCreated { task, message, .. } => {
                assert_eq!(task.id, TaskId::new(42));
                assert_eq!(task.title, "Esai Sejarah");
                assert_eq!(message, "Tugas baru dari Bu Sari");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decodes_string_encoded_follow() {
        let data = Value::String(
            r#"{"type":"user_followed","follower":{"id":3,"username":"budi","name":"Budi","avatar":"/a.png"},"message":"m","timestamp":"t1"}"#
                .to_string(),
        );
        let event = RealtimeEvent::decode(EventName::UserFollowed, &data).expect("decode");
        assert!(matches!(event, RealtimeEvent::UserFollowed { ref follower, .. } if follower.username == "budi"));
        assert_eq!(event.timestamp(), Some("t1"));
    }

    #[test]
    fn test_missing_subject_is_generic() {
        let data = json!({"type": "task_submitted", "message": "m"});
        let event = RealtimeEvent::decode(EventName::TaskSubmitted, &data).expect("decode");
        assert_eq!(
            event,
            RealtimeEvent::Generic {
                source: EventName::TaskSubmitted,
                message: "m".to_string(),
                timestamp: None,
            }
        );
    }

    #[test]
    fn test_rejects_non_object() {
        let err = RealtimeEvent::decode(EventName::TaskCreated, &json!(5)).unwrap_err();
        assert_eq!(err.code(), "TransportError");
    }
}
