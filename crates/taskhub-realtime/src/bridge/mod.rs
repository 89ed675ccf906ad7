//! Background delivery: push payloads that arrive outside the realtime
//! channel, queued into the notification store.

pub mod delivery;
pub mod ingress;
pub mod message;
pub mod push;

pub use delivery::{BackgroundDeliveryBridge, DeliveryHandle, channel};
pub use message::PushMessage;
pub use push::{PushPayload, PushReceiver};
