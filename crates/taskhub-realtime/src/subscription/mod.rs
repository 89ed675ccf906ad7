//! Push subscription lifecycle: permission, platform subscription, registry.

pub mod fake;
pub mod manager;
pub mod native;
pub mod platform;
pub mod registry;
pub mod retry;

pub use manager::{SubscriptionManager, SubscriptionState};
pub use native::NativePushPlatform;
pub use platform::{PermissionState, PlatformCapabilities, PushPlatform, PushSubscription};
pub use registry::{HttpRegistryClient, NotificationRegistry};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
