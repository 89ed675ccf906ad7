//! Read-side projection of the notification store.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use taskhub_core::types::TaskId;

use super::record::{NotificationKind, NotificationRecord};
use super::store::NotificationStore;

/// Navigation target for a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Route {
    /// Profile of the user who followed.
    Profile {
        /// Username of the profile.
        username: String,
    },
    /// Detail view of a task.
    TaskDetail {
        /// Task to show.
        task_id: TaskId,
    },
    /// Default landing view.
    Dashboard,
    /// Page named by a push payload.
    Link {
        /// Application path or absolute URL.
        url: String,
    },
}

impl Route {
    /// Application path for the route.
    pub fn path(&self) -> String {
        match self {
            Self::Profile { username } => format!("/profile/{username}"),
            Self::TaskDetail { task_id } => format!("/dashboard/{task_id}"),
            Self::Dashboard => "/dashboard".to_string(),
            Self::Link { url } => url.clone(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Stateless view over the store. Every call reads the current state.
#[derive(Debug, Clone)]
pub struct NotificationPresenter {
    store: Arc<NotificationStore>,
}

impl NotificationPresenter {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }

    /// Records, newest first.
    pub fn records(&self) -> Vec<NotificationRecord> {
        self.store.snapshot()
    }

    /// Number of unread records.
    pub fn unread_count(&self) -> usize {
        self.store.snapshot().iter().filter(|r| !r.read).count()
    }

    /// Age of `record` relative to now.
    pub fn relative_time(&self, record: &NotificationRecord) -> String {
        relative_time_at(record.created_at, Utc::now())
    }

    /// Navigation target for `record`.
    pub fn route_for(&self, record: &NotificationRecord) -> Route {
        route_for(record)
    }
}

/// Bucket the age of `at` as seen from `now`.
///
/// Timestamps in the future count as "just now".
pub fn relative_time_at(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds();
    let mins = secs / 60;
    let hours = mins / 60;
    let days = hours / 24;

    if secs < 60 {
        "just now".to_string()
    } else if mins < 60 {
        plural(mins, "minute")
    } else if hours < 24 {
        plural(hours, "hour")
    } else if days < 7 {
        plural(days, "day")
    } else {
        at.format("%-d %b %Y").to_string()
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Navigation target: the pushed url when one was given, profile for follows
/// with a username, task detail when a task is attached, dashboard otherwise.
pub fn route_for(record: &NotificationRecord) -> Route {
    if let Some(url) = record.url.as_ref().filter(|u| !u.is_empty()) {
        return Route::Link { url: url.clone() };
    }

    if record.kind == NotificationKind::UserFollowed {
        if let Some(username) = record.related_username.as_ref().filter(|u| !u.is_empty()) {
            return Route::Profile {
                username: username.clone(),
            };
        }
    }

    match record.related_task_id {
        Some(task_id) => Route::TaskDetail { task_id },
        None => Route::Dashboard,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::notification::persistence::MemoryStorage;

    fn at(now: DateTime<Utc>, ago: Duration) -> String {
        relative_time_at(now - ago, now)
    }

    #[test]
    fn test_relative_time_buckets() {
        let now = DateTime::parse_from_rfc3339("2025-03-20T12:00:00Z")
            .expect("valid")
            .with_timezone(&Utc);

        assert_eq!(at(now, Duration::seconds(59)), "just now");
        assert_eq!(at(now, Duration::seconds(-30)), "just now");
        assert_eq!(at(now, Duration::minutes(1)), "1 minute ago");
        assert_eq!(at(now, Duration::minutes(59)), "59 minutes ago");
        assert_eq!(at(now, Duration::hours(1)), "1 hour ago");
        assert_eq!(at(now, Duration::hours(23)), "23 hours ago");
        assert_eq!(at(now, Duration::days(1)), "1 day ago");
        assert_eq!(at(now, Duration::days(6)), "6 days ago");
        assert_eq!(at(now, Duration::days(19)), "1 Mar 2025");
    }

    #[test]
    fn test_route_targets() {
        let followed = NotificationRecord::new("f".into(), NotificationKind::UserFollowed, "t", "b")
            .with_username(Some("budi".to_string()));
        assert_eq!(route_for(&followed).path(), "/profile/budi");

        let task = NotificationRecord::new("t".into(), NotificationKind::TaskCreated, "t", "b")
            .with_task(Some(TaskId::new(42)));
        assert_eq!(route_for(&task), Route::TaskDetail { task_id: TaskId::new(42) });
        assert_eq!(route_for(&task).path(), "/dashboard/42");

        let followed_without_name =
            NotificationRecord::new("g".into(), NotificationKind::UserFollowed, "t", "b");
        assert_eq!(route_for(&followed_without_name), Route::Dashboard);

        let pushed = NotificationRecord::new("p".into(), NotificationKind::TaskCreated, "t", "b")
            .with_task(Some(TaskId::new(7)))
            .with_url(Some("/dashboard/7/submissions".to_string()));
        assert_eq!(
            route_for(&pushed),
            Route::Link {
                url: "/dashboard/7/submissions".to_string()
            }
        );
        assert_eq!(route_for(&pushed).path(), "/dashboard/7/submissions");
    }

    #[test]
    fn test_unread_count_tracks_store() {
        let store = Arc::new(NotificationStore::load(
            Arc::new(MemoryStorage::new()),
            "history",
            20,
        ));
        let presenter = NotificationPresenter::new(store.clone());

        for id in ["a", "b", "c"] {
            store.append(NotificationRecord::new(id.into(), NotificationKind::Generic, "t", ""));
        }
        assert_eq!(presenter.unread_count(), 3);

        store.mark_read(&"b".into());
        assert_eq!(presenter.unread_count(), 2);

        store.mark_all_read();
        assert_eq!(presenter.unread_count(), 0);
        assert_eq!(presenter.records().len(), 3);
    }
}
