//! # taskhub-realtime
//!
//! Real-time notification pipeline of the TaskHub school task app. Provides:
//!
//! - Push permission and subscription lifecycle against the notification registry
//! - A per-user private channel over the Pusher protocol
//! - Bounded, persisted notification history with read state
//! - Presentation helpers (unread count, relative time, navigation targets)
//! - Background delivery of out-of-band push messages

pub mod bridge;
pub mod channel;
pub mod context;
pub mod error;
pub mod notification;
pub mod subscription;

pub use bridge::{BackgroundDeliveryBridge, DeliveryHandle, PushMessage, PushReceiver};
pub use channel::{ConnectionState, RealtimeChannel, RealtimeEvent};
pub use context::{NotificationContext, NotificationContextBuilder};
pub use error::{NotifyError, NotifyResult};
pub use notification::{NotificationPresenter, NotificationRecord, NotificationStore, Route};
pub use subscription::{PermissionState, SubscriptionManager, SubscriptionState};
