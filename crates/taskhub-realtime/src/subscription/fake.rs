//! Configurable push platform and registry for tests and dry runs.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{NotifyError, NotifyResult};

use super::platform::{
    PermissionState, PlatformCapabilities, PushPlatform, PushSubscription, SubscriptionKeys,
};
use super::registry::NotificationRegistry;

#[derive(Debug)]
struct FakePlatformInner {
    capabilities: PlatformCapabilities,
    permission: PermissionState,
    prompt_answer: PermissionState,
    prompt_delay: Option<Duration>,
    prompt_count: u32,
    worker_registrations: u32,
    subscription: Option<PushSubscription>,
    subscribe_failures: VecDeque<NotifyError>,
    subscribe_calls: u32,
    unsubscribe_calls: u32,
    endpoint_seq: u32,
}

/// Push platform with scripted answers.
#[derive(Debug)]
pub struct FakePushPlatform {
    inner: Mutex<FakePlatformInner>,
}

impl Default for FakePushPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePushPlatform {
    /// Fully capable platform, permission not yet asked, prompt answers granted.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FakePlatformInner {
                capabilities: PlatformCapabilities::full(),
                permission: PermissionState::Default,
                prompt_answer: PermissionState::Granted,
                prompt_delay: None,
                prompt_count: 0,
                worker_registrations: 0,
                subscription: None,
                subscribe_failures: VecDeque::new(),
                subscribe_calls: 0,
                unsubscribe_calls: 0,
                endpoint_seq: 0,
            }),
        }
    }

    pub fn with_capabilities(self, capabilities: PlatformCapabilities) -> Self {
        self.lock().capabilities = capabilities;
        self
    }

    pub fn with_permission(self, permission: PermissionState) -> Self {
        self.lock().permission = permission;
        self
    }

    /// Answer given at the permission prompt.
    pub fn with_prompt_answer(self, answer: PermissionState) -> Self {
        self.lock().prompt_answer = answer;
        self
    }

    /// Time the user takes to answer the prompt.
    pub fn with_prompt_delay(self, delay: Duration) -> Self {
        self.lock().prompt_delay = Some(delay);
        self
    }

    /// Pre-existing local subscription.
    pub fn with_subscription(self, subscription: PushSubscription) -> Self {
        self.lock().subscription = Some(subscription);
        self
    }

    /// Fail the next `subscribe` call with `error`.
    pub fn fail_subscribe(&self, error: NotifyError) {
        self.lock().subscribe_failures.push_back(error);
    }

    /// Change the permission outside the application.
    pub fn set_permission(&self, permission: PermissionState) {
        self.lock().permission = permission;
    }

    pub fn prompt_count(&self) -> u32 {
        self.lock().prompt_count
    }

    pub fn worker_registrations(&self) -> u32 {
        self.lock().worker_registrations
    }

    pub fn subscribe_calls(&self) -> u32 {
        self.lock().subscribe_calls
    }

    pub fn unsubscribe_calls(&self) -> u32 {
        self.lock().unsubscribe_calls
    }

    pub fn current_subscription(&self) -> Option<PushSubscription> {
        self.lock().subscription.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakePlatformInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PushPlatform for FakePushPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        self.lock().capabilities
    }

    async fn permission(&self) -> PermissionState {
        self.lock().permission
    }

    async fn prompt_permission(&self) -> NotifyResult<PermissionState> {
        let delay = {
            let mut inner = self.lock();
            inner.prompt_count += 1;
            inner.prompt_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        inner.permission = inner.prompt_answer;
        Ok(inner.permission)
    }

    async fn register_worker(&self) -> NotifyResult<()> {
        self.lock().worker_registrations += 1;
        Ok(())
    }

    async fn get_subscription(&self) -> NotifyResult<Option<PushSubscription>> {
        Ok(self.lock().subscription.clone())
    }

    async fn subscribe(&self, application_server_key: &[u8]) -> NotifyResult<PushSubscription> {
        let mut inner = self.lock();
        inner.subscribe_calls += 1;

        if application_server_key.is_empty() {
            return Err(NotifyError::platform_fatal("empty application server key"));
        }
        if let Some(error) = inner.subscribe_failures.pop_front() {
            return Err(error);
        }

        inner.endpoint_seq += 1;
        let subscription = PushSubscription {
            endpoint: format!("https://push.fake/endpoint-{}", inner.endpoint_seq),
            keys: SubscriptionKeys {
                auth: URL_SAFE_NO_PAD.encode([inner.endpoint_seq as u8; 16]),
                p256dh: URL_SAFE_NO_PAD.encode([4u8; 65]),
            },
        };
        inner.subscription = Some(subscription.clone());
        Ok(subscription)
    }

    async fn unsubscribe(&self) -> NotifyResult<bool> {
        let mut inner = self.lock();
        inner.unsubscribe_calls += 1;
        Ok(inner.subscription.take().is_some())
    }
}

#[derive(Debug)]
struct FakeRegistryInner {
    vapid_key: String,
    vapid_failures: VecDeque<NotifyError>,
    register_failures: VecDeque<NotifyError>,
    unregister_failure: Option<NotifyError>,
    registered: Vec<PushSubscription>,
    unregistered: Vec<String>,
    test_result: NotifyResult<bool>,
    test_calls: u32,
    count: NotifyResult<u64>,
}

/// Notification registry kept in memory.
#[derive(Debug)]
pub struct FakeRegistry {
    inner: Mutex<FakeRegistryInner>,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRegistry {
    /// Registry serving a well-formed 87-character VAPID key.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FakeRegistryInner {
                vapid_key: URL_SAFE_NO_PAD.encode([4u8; 65]),
                vapid_failures: VecDeque::new(),
                register_failures: VecDeque::new(),
                unregister_failure: None,
                registered: Vec::new(),
                unregistered: Vec::new(),
                test_result: Ok(true),
                test_calls: 0,
                count: Ok(0),
            }),
        }
    }

    pub fn with_vapid_key(self, key: impl Into<String>) -> Self {
        self.lock().vapid_key = key.into();
        self
    }

    /// Fail the next VAPID key fetch.
    pub fn fail_vapid(&self, error: NotifyError) {
        self.lock().vapid_failures.push_back(error);
    }

    /// Fail the next registration.
    pub fn fail_register(&self, error: NotifyError) {
        self.lock().register_failures.push_back(error);
    }

    /// Fail every unregistration.
    pub fn fail_unregister(&self, error: NotifyError) {
        self.lock().unregister_failure = Some(error);
    }

    pub fn set_test_result(&self, result: NotifyResult<bool>) {
        self.lock().test_result = result;
    }

    pub fn set_count(&self, count: NotifyResult<u64>) {
        self.lock().count = count;
    }

    /// Subscriptions registered so far, oldest first.
    pub fn registered(&self) -> Vec<PushSubscription> {
        self.lock().registered.clone()
    }

    /// Endpoints unregistered so far.
    pub fn unregistered(&self) -> Vec<String> {
        self.lock().unregistered.clone()
    }

    pub fn test_calls(&self) -> u32 {
        self.lock().test_calls
    }

    fn lock(&self) -> MutexGuard<'_, FakeRegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NotificationRegistry for FakeRegistry {
    async fn vapid_public_key(&self) -> NotifyResult<String> {
        let mut inner = self.lock();
        match inner.vapid_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(inner.vapid_key.clone()),
        }
    }

    async fn register(&self, subscription: &PushSubscription) -> NotifyResult<()> {
        let mut inner = self.lock();
        if let Some(error) = inner.register_failures.pop_front() {
            return Err(error);
        }
        inner.registered.push(subscription.clone());
        Ok(())
    }

    async fn unregister(&self, endpoint: &str) -> NotifyResult<()> {
        let mut inner = self.lock();
        if let Some(error) = inner.unregister_failure.clone() {
            return Err(error);
        }
        inner.unregistered.push(endpoint.to_string());
        Ok(())
    }

    async fn send_test(&self) -> NotifyResult<bool> {
        let mut inner = self.lock();
        inner.test_calls += 1;
        inner.test_result.clone()
    }

    async fn subscriptions_count(&self) -> NotifyResult<u64> {
        self.lock().count.clone()
    }
}
