//! Mapping from realtime events to history records and system notifications.

use crate::channel::event::RealtimeEvent;
use crate::channel::types::EventName;

use super::notifier::{DEFAULT_TAG, VisibleNotification};
use super::record::{NotificationId, NotificationKind, NotificationRecord};

/// Title for a new task without a name.
pub const TITLE_TASK_CREATED: &str = "Tugas Baru";
/// Title for a submission.
pub const TITLE_TASK_SUBMITTED: &str = "Tugas Dikumpulkan";
/// Title for a new follower.
pub const TITLE_USER_FOLLOWED: &str = "Follower Baru!";
/// Fallback title.
pub const TITLE_GENERIC: &str = "Notifikasi";

/// Formats realtime events.
pub struct NotificationFormatter;

impl NotificationFormatter {
    /// History record for `event`.
    ///
    /// The id is the server timestamp when present, otherwise a fresh id.
    pub fn record(event: &RealtimeEvent) -> NotificationRecord {
        let id = event
            .timestamp()
            .filter(|t| !t.is_empty())
            .map(NotificationId::new)
            .unwrap_or_else(NotificationId::generate);
        let title = Self::title(event);
        let body = event.message().to_string();

        match event {
            RealtimeEvent::TaskCreated { task, .. } => {
                NotificationRecord::new(id, NotificationKind::TaskCreated, title, body)
                    .with_task(Some(task.id))
            }
            RealtimeEvent::TaskSubmitted { task, .. } => {
                NotificationRecord::new(id, NotificationKind::TaskSubmitted, title, body)
                    .with_task(Some(task.id))
            }
            RealtimeEvent::UserFollowed { follower, .. } => {
                NotificationRecord::new(id, NotificationKind::UserFollowed, title, body)
                    .with_username(Some(follower.username.clone()).filter(|u| !u.is_empty()))
            }
            RealtimeEvent::Generic { .. } => {
                NotificationRecord::new(id, NotificationKind::Generic, title, body)
            }
        }
    }

    /// System notification for `event`, tagged so repeats about the same
    /// task or follower collapse.
    pub fn visible(event: &RealtimeEvent) -> VisibleNotification {
        let title = Self::title(event);
        let body = event.message();

        match event {
            RealtimeEvent::TaskCreated { task, .. } => {
                VisibleNotification::new(title, body, format!("task-{}", task.id))
            }
            RealtimeEvent::TaskSubmitted { task, .. } => {
                VisibleNotification::new(title, body, format!("task-submitted-{}", task.id))
            }
            RealtimeEvent::UserFollowed { follower, .. } => {
                let notification =
                    VisibleNotification::new(title, body, format!("user-followed-{}", follower.id));
                match follower.avatar.as_deref().filter(|a| !a.is_empty()) {
                    Some(avatar) => notification.with_icon(avatar),
                    None => notification,
                }
            }
            RealtimeEvent::Generic { .. } => VisibleNotification::new(title, body, DEFAULT_TAG),
        }
    }

    fn title(event: &RealtimeEvent) -> String {
        match event {
            RealtimeEvent::TaskCreated { task, .. } if !task.title.is_empty() => task.title.clone(),
            RealtimeEvent::TaskCreated { .. } => TITLE_TASK_CREATED.to_string(),
            RealtimeEvent::TaskSubmitted { .. } => TITLE_TASK_SUBMITTED.to_string(),
            RealtimeEvent::UserFollowed { .. } => TITLE_USER_FOLLOWED.to_string(),
            RealtimeEvent::Generic { source, .. } => {
                let title = match source {
                    EventName::TaskCreated => TITLE_TASK_CREATED,
                    EventName::TaskSubmitted => TITLE_TASK_SUBMITTED,
                    EventName::UserFollowed => TITLE_USER_FOLLOWED,
                };
                title.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use taskhub_core::types::{TaskId, UserId};

    use super::*;
    use crate::channel::event::{FollowerSummary, TaskSummary};
    use crate::notification::notifier::DEFAULT_ICON;

    fn task(id: i64, title: &str) -> TaskSummary {
        TaskSummary {
            id: TaskId::new(id),
            title: title.to_string(),
            description: None,
            deadline: None,
            target: "kelas-7a".to_string(),
        }
    }

    #[test]
    fn test_task_created_record() {
        let event = RealtimeEvent::TaskCreated {
            task: task(42, "Esai"),
            message: "Tugas baru".to_string(),
            timestamp: Some("2025-03-01T08:30:00Z".to_string()),
        };

        let record = NotificationFormatter::record(&event);
        assert_eq!(record.id, "2025-03-01T08:30:00Z".into());
        assert_eq!(record.kind, NotificationKind::TaskCreated);
        assert_eq!(record.related_task_id, Some(TaskId::new(42)));
        assert_eq!(record.title, "Esai");
        assert!(!record.read);

        let visible = NotificationFormatter::visible(&event);
        assert_eq!(visible.tag, "task-42");
        assert_eq!(visible.icon, DEFAULT_ICON);
    }

    #[test]
    fn test_untitled_task_and_submission_titles() {
        let created = RealtimeEvent::TaskCreated {
            task: task(1, ""),
            message: String::new(),
            timestamp: None,
        };
        assert_eq!(NotificationFormatter::record(&created).title, TITLE_TASK_CREATED);

        let submitted = RealtimeEvent::TaskSubmitted {
            task: task(9, "Esai"),
            message: "Budi mengumpulkan".to_string(),
            timestamp: None,
        };
        let record = NotificationFormatter::record(&submitted);
        assert_eq!(record.title, TITLE_TASK_SUBMITTED);
        assert_eq!(record.body, "Budi mengumpulkan");
        assert_eq!(NotificationFormatter::visible(&submitted).tag, "task-submitted-9");
    }

    #[test]
    fn test_follow_uses_avatar_and_username() {
        let event = RealtimeEvent::UserFollowed {
            follower: FollowerSummary {
                id: UserId::new(3),
                username: "budi".to_string(),
                name: "Budi".to_string(),
                avatar: Some("/avatars/3.png".to_string()),
            },
            message: "budi mengikuti kamu".to_string(),
            timestamp: Some("t".to_string()),
        };

        let record = NotificationFormatter::record(&event);
        assert_eq!(record.related_username.as_deref(), Some("budi"));
        assert_eq!(record.related_task_id, None);

        let visible = NotificationFormatter::visible(&event);
        assert_eq!(visible.title, TITLE_USER_FOLLOWED);
        assert_eq!(visible.tag, "user-followed-3");
        assert_eq!(visible.icon, "/avatars/3.png");
        assert_eq!(visible.badge, DEFAULT_ICON);
    }

    #[test]
    fn test_missing_timestamp_generates_id() {
        let event = RealtimeEvent::Generic {
            source: EventName::TaskCreated,
            message: "m".to_string(),
            timestamp: None,
        };
        let a = NotificationFormatter::record(&event);
        let b = NotificationFormatter::record(&event);
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, NotificationKind::Generic);
        assert_eq!(NotificationFormatter::visible(&event).tag, DEFAULT_TAG);
    }
}
