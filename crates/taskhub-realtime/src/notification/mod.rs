//! Notification history, presentation, formatting and system notifications.

pub mod dispatcher;
pub mod formatter;
pub mod notifier;
pub mod persistence;
pub mod presenter;
pub mod record;
pub mod store;

pub use dispatcher::EventDispatcher;
pub use presenter::{NotificationPresenter, Route};
pub use record::{NotificationId, NotificationKind, NotificationRecord};
pub use store::{AppendOutcome, NotificationStore};
