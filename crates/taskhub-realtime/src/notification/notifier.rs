//! System-level visible notifications.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

/// Icon and badge used when a payload does not name one.
pub const DEFAULT_ICON: &str = "/batik.png";

/// Tag used when a payload does not name one.
pub const DEFAULT_TAG: &str = "default";

/// Visible notifications kept before the oldest tag is dropped.
pub const DEFAULT_VISIBLE_LIMIT: usize = 20;

/// A notification to show outside the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleNotification {
    pub title: String,
    pub body: String,
    /// Notifications sharing a tag replace each other.
    pub tag: String,
    pub icon: String,
    pub badge: String,
    /// Page opened when the notification is clicked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl VisibleNotification {
    /// Notification with the default icon and badge.
    pub fn new(title: impl Into<String>, body: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            tag: tag.into(),
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_ICON.to_string(),
            url: None,
        }
    }

    /// Override the icon.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }
}

/// Displays system notifications.
pub trait SystemNotifier: Send + Sync + Debug {
    /// Show `notification`, replacing any visible one with the same tag.
    fn show(&self, notification: VisibleNotification);
}

/// Keeps one visible notification per tag and logs each display.
///
/// At most `limit` tags stay visible; showing a new tag past the limit drops
/// the tag shown least recently.
#[derive(Debug)]
pub struct TagCollapsingNotifier {
    visible: DashMap<String, (u64, VisibleNotification)>,
    shown: AtomicU64,
    limit: usize,
}

impl Default for TagCollapsingNotifier {
    fn default() -> Self {
        Self::with_limit(DEFAULT_VISIBLE_LIMIT)
    }
}

impl TagCollapsingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            visible: DashMap::new(),
            shown: AtomicU64::new(0),
            limit: limit.max(1),
        }
    }

    fn evict_oldest(&self) {
        while self.visible.len() > self.limit {
            let oldest = self
                .visible
                .iter()
                .min_by_key(|e| e.value().0)
                .map(|e| e.key().clone());
            match oldest {
                Some(tag) => {
                    self.visible.remove(&tag);
                    debug!(tag = %tag, "Dropped oldest visible notification");
                }
                None => break,
            }
        }
    }

    /// Currently visible notifications, ordered by tag.
    pub fn visible(&self) -> Vec<VisibleNotification> {
        let mut all: Vec<VisibleNotification> =
            self.visible.iter().map(|e| e.value().1.clone()).collect();
        all.sort_by(|a, b| a.tag.cmp(&b.tag));
        all
    }

    /// Visible notification under `tag`.
    pub fn get(&self, tag: &str) -> Option<VisibleNotification> {
        self.visible.get(tag).map(|e| e.value().1.clone())
    }

    /// Total number of `show` calls.
    pub fn shown_count(&self) -> u64 {
        self.shown.load(Ordering::Relaxed)
    }

    /// Dismiss the notification under `tag`.
    pub fn dismiss(&self, tag: &str) -> bool {
        self.visible.remove(tag).is_some()
    }
}

impl SystemNotifier for TagCollapsingNotifier {
    fn show(&self, notification: VisibleNotification) {
        let seq = self.shown.fetch_add(1, Ordering::Relaxed);
        let tag = notification.tag.clone();
        let replaced = self
            .visible
            .insert(tag.clone(), (seq, notification.clone()))
            .is_some();
        if !replaced {
            self.evict_oldest();
        }
        info!(
            tag = %tag,
            title = %notification.title,
            body = %notification.body,
            replaced,
            "System notification shown"
        );
    }
}
