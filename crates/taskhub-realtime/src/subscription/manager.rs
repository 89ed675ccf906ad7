//! Push permission and subscription lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::{NotifyError, NotifyResult};

use super::platform::{PermissionState, PushPlatform, PushSubscription};
use super::registry::NotificationRegistry;
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};

/// Expected text length range of a VAPID public key (65 raw bytes).
const VAPID_KEY_LEN: std::ops::RangeInclusive<usize> = 80..=90;

/// Observable subscription state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionState {
    /// Platform capability, computed once.
    pub supported: bool,
    /// Last permission read from the platform.
    pub permission: PermissionState,
    /// Subscribed locally and registered remotely.
    pub subscribed: bool,
    /// An operation is in flight.
    pub is_loading: bool,
    /// Failure of the last operation; cleared when the next one starts.
    pub error: Option<NotifyError>,
}

impl SubscriptionState {
    /// Error text for display.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// One failed subscribe attempt.
struct AttemptFailure {
    error: NotifyError,
    retry: bool,
}

impl From<NotifyError> for AttemptFailure {
    fn from(error: NotifyError) -> Self {
        let retry = error.is_transient();
        Self { error, retry }
    }
}

/// Mediates the push opt-in lifecycle between the platform and the registry.
///
/// Operations report success as `bool` and leave the failure in
/// [`SubscriptionState::error`].
#[derive(Debug)]
pub struct SubscriptionManager {
    platform: Arc<dyn PushPlatform>,
    registry: Arc<dyn NotificationRegistry>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    supported: bool,
    state: watch::Sender<SubscriptionState>,
    in_flight: AtomicUsize,
    prompt: Mutex<()>,
}

struct LoadingGuard<'a> {
    manager: &'a SubscriptionManager,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let remaining = self.manager.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        self.manager
            .state
            .send_modify(|s| s.is_loading = remaining > 0);
    }
}

impl SubscriptionManager {
    pub fn new(platform: Arc<dyn PushPlatform>, registry: Arc<dyn NotificationRegistry>) -> Self {
        Self::with_retry(platform, registry, RetryPolicy::default(), Arc::new(TokioSleeper))
    }

    /// Manager with an explicit retry policy and delay source.
    pub fn with_retry(
        platform: Arc<dyn PushPlatform>,
        registry: Arc<dyn NotificationRegistry>,
        retry: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let supported = platform.capabilities().is_supported();
        let (state, _) = watch::channel(SubscriptionState {
            supported,
            ..SubscriptionState::default()
        });

        Self {
            platform,
            registry,
            retry,
            sleeper,
            supported,
            state,
            in_flight: AtomicUsize::new(0),
            prompt: Mutex::new(()),
        }
    }

    /// Whether push notifications can work on this host.
    pub fn check_support(&self) -> bool {
        self.supported
    }

    /// Snapshot of the observable state.
    pub fn state(&self) -> SubscriptionState {
        self.state.borrow().clone()
    }

    /// Receiver for state changes.
    pub fn watch(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    /// Re-read permission and whether a local subscription exists.
    pub async fn refresh(&self) -> SubscriptionState {
        if self.supported {
            self.read_permission().await;
            match self.platform.get_subscription().await {
                Ok(existing) => self.state.send_modify(|s| s.subscribed = existing.is_some()),
                Err(e) => warn!(error = %e, "Failed to read local push subscription"),
            }
        }
        self.state()
    }

    /// Current permission, prompting once if it has never been asked.
    ///
    /// Concurrent callers share a single prompt.
    pub async fn request_permission(&self) -> PermissionState {
        let _loading = self.begin();
        match self.ensure_permission().await {
            Ok(permission) => permission,
            Err(e) => {
                self.fail(e);
                self.state.borrow().permission
            }
        }
    }

    /// Subscribe to push notifications and register with the registry.
    pub async fn subscribe(&self) -> bool {
        let _loading = self.begin();
        match self.try_subscribe().await {
            Ok(subscription) => {
                info!(endpoint = %subscription.endpoint, "Push notifications enabled");
                self.state.send_modify(|s| s.subscribed = true);
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    /// Unregister remotely (best effort) and remove the local subscription.
    pub async fn unsubscribe(&self) -> bool {
        let _loading = self.begin();
        match self.try_unsubscribe().await {
            Ok(()) => {
                info!("Push notifications disabled");
                self.state.send_modify(|s| s.subscribed = false);
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    /// Ask the registry to push one test notification.
    pub async fn send_test(&self) -> bool {
        let _loading = self.begin();
        match self.registry.send_test().await {
            Ok(true) => true,
            Ok(false) => {
                self.fail(NotifyError::registry_rejected("test notification was not sent"));
                false
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    /// Number of subscriptions the registry holds for the user; 0 on failure.
    pub async fn subscriptions_count(&self) -> u64 {
        match self.registry.subscriptions_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to fetch subscription count");
                0
            }
        }
    }

    fn begin(&self) -> LoadingGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
        LoadingGuard { manager: self }
    }

    fn fail(&self, error: NotifyError) {
        warn!(code = error.code(), "Push subscription operation failed: {}", error);
        self.state.send_modify(|s| s.error = Some(error));
    }

    async fn read_permission(&self) -> PermissionState {
        let permission = self.platform.permission().await;
        self.state.send_modify(|s| s.permission = permission);
        permission
    }

    async fn ensure_permission(&self) -> NotifyResult<PermissionState> {
        if !self.supported {
            return Err(NotifyError::Unsupported);
        }

        let current = self.read_permission().await;
        if current != PermissionState::Default {
            return Ok(current);
        }

        let _prompt = self.prompt.lock().await;

        // Another caller may have answered while we waited.
        let current = self.read_permission().await;
        if current != PermissionState::Default {
            return Ok(current);
        }

        debug!("Prompting for notification permission");
        let answer = self.platform.prompt_permission().await?;
        self.state.send_modify(|s| s.permission = answer);
        Ok(answer)
    }

    async fn try_subscribe(&self) -> NotifyResult<PushSubscription> {
        let permission = self.ensure_permission().await?;
        if !permission.is_granted() {
            return Err(NotifyError::PermissionDenied);
        }

        self.platform.register_worker().await?;

        let max_attempts = self.retry.max_attempts();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.attempt_subscribe().await {
                Ok(subscription) => return Ok(subscription),
                Err(failure) => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %failure.error,
                        "Push subscription attempt failed"
                    );
                    last_error = Some(failure.error);
                    if !failure.retry {
                        break;
                    }
                    if attempt < max_attempts {
                        self.sleeper.sleep(self.retry.backoff(attempt)).await;
                    }
                }
            }
        }

        let reason = last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
        Err(NotifyError::SubscriptionFailed(reason))
    }

    /// Fetch the key, reuse or create a local subscription, register it.
    async fn attempt_subscribe(&self) -> Result<PushSubscription, AttemptFailure> {
        let key_text = self.registry.vapid_public_key().await?;
        let key = decode_vapid_key(&key_text)?;

        if let Some(existing) = self.platform.get_subscription().await? {
            return match self.registry.register(&existing).await {
                Ok(()) => {
                    debug!(endpoint = %existing.endpoint, "Reused existing push subscription");
                    Ok(existing)
                }
                Err(error) => {
                    warn!(endpoint = %existing.endpoint, "Dropping stale push subscription");
                    if let Err(e) = self.platform.unsubscribe().await {
                        warn!(error = %e, "Failed to remove stale push subscription");
                    }
                    Err(AttemptFailure { error, retry: true })
                }
            };
        }

        let subscription = self.platform.subscribe(&key).await?;
        if let Err(error) = self.registry.register(&subscription).await {
            // A subscription the registry never accepted must not outlive the attempt.
            warn!(endpoint = %subscription.endpoint, "Removing unregistered push subscription");
            if let Err(e) = self.platform.unsubscribe().await {
                warn!(error = %e, "Failed to remove unregistered push subscription");
            }
            return Err(error.into());
        }
        Ok(subscription)
    }

    async fn try_unsubscribe(&self) -> NotifyResult<()> {
        if !self.supported {
            return Err(NotifyError::Unsupported);
        }

        let subscription = self
            .platform
            .get_subscription()
            .await?
            .ok_or(NotifyError::NoActiveSubscription)?;

        if let Err(e) = self.registry.unregister(&subscription.endpoint).await {
            warn!(error = %e, "Registry unsubscribe failed, continuing with local teardown");
        }

        if self.platform.unsubscribe().await? {
            Ok(())
        } else {
            Err(NotifyError::NoActiveSubscription)
        }
    }
}

/// Decode a URL-safe base64 VAPID key, tolerating padding.
pub fn decode_vapid_key(key: &str) -> NotifyResult<Vec<u8>> {
    let key = key.trim();
    if !VAPID_KEY_LEN.contains(&key.len()) {
        warn!(
            length = key.len(),
            "VAPID key length is unusual, expected about 87 characters"
        );
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(key.trim_end_matches('='))
        .map_err(|e| NotifyError::registry_rejected(format!("VAPID key is not URL-safe base64: {e}")))?;
    if bytes.is_empty() {
        return Err(NotifyError::registry_rejected("VAPID key is empty"));
    }
    Ok(bytes)
}
