//! Notification context: owns one instance of every pipeline component and
//! follows the host's authentication state.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskhub_core::config::AppConfig;
use taskhub_core::types::AuthSession;

use crate::bridge::delivery::{self, DeliveryHandle};
use crate::bridge::push::PushReceiver;
use crate::channel::client::RealtimeChannel;
use crate::channel::pusher::PusherTransport;
use crate::channel::state::ConnectionState;
use crate::channel::transport::RealtimeTransport;
use crate::error::NotifyResult;
use crate::notification::dispatcher::EventDispatcher;
use crate::notification::notifier::{SystemNotifier, TagCollapsingNotifier};
use crate::notification::persistence::{HistoryStorage, JsonFileStorage};
use crate::notification::presenter::{NotificationPresenter, Route};
use crate::notification::record::NotificationId;
use crate::notification::store::NotificationStore;
use crate::subscription::manager::SubscriptionManager;
use crate::subscription::native::NativePushPlatform;
use crate::subscription::platform::PushPlatform;
use crate::subscription::registry::{HttpRegistryClient, NotificationRegistry};
use crate::subscription::retry::{RetryPolicy, Sleeper, TokioSleeper};

/// Builds a [`NotificationContext`], real adapters unless overridden.
pub struct NotificationContextBuilder {
    config: AppConfig,
    storage: Option<Arc<dyn HistoryStorage>>,
    platform: Option<Arc<dyn PushPlatform>>,
    registry: Option<Arc<dyn NotificationRegistry>>,
    transport: Option<Arc<dyn RealtimeTransport>>,
    notifier: Option<Arc<dyn SystemNotifier>>,
    retry: Option<RetryPolicy>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl NotificationContextBuilder {
    pub fn storage(mut self, storage: Arc<dyn HistoryStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn platform(mut self, platform: Arc<dyn PushPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn NotificationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn RealtimeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn SystemNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        self.retry = Some(retry);
        self.sleeper = Some(sleeper);
        self
    }

    /// Wire the components and start the delivery bridge.
    ///
    /// Must run inside a tokio runtime.
    pub fn build(self) -> NotifyResult<NotificationContext> {
        let config = self.config;

        let storage = self.storage.unwrap_or_else(|| {
            Arc::new(JsonFileStorage::new(&config.store.data_dir)) as Arc<dyn HistoryStorage>
        });
        let store = Arc::new(NotificationStore::from_config(&config.store, storage));

        let platform = self.platform.unwrap_or_else(|| {
            Arc::new(NativePushPlatform::new(config.push.clone())) as Arc<dyn PushPlatform>
        });

        let mut http_registry = None;
        let registry = match self.registry {
            Some(registry) => registry,
            None => {
                let client = Arc::new(HttpRegistryClient::new(config.registry.clone())?);
                http_registry = Some(client.clone());
                client as Arc<dyn NotificationRegistry>
            }
        };

        let transport: Arc<dyn RealtimeTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(PusherTransport::new(config.realtime.clone())?),
        };

        let notifier = self.notifier.unwrap_or_else(|| {
            Arc::new(TagCollapsingNotifier::with_limit(config.store.capacity)) as Arc<dyn SystemNotifier>
        });

        let subscriptions = Arc::new(SubscriptionManager::with_retry(
            platform.clone(),
            registry,
            self.retry
                .unwrap_or_else(|| RetryPolicy::from_config(&config.registry)),
            self.sleeper
                .unwrap_or_else(|| Arc::new(TokioSleeper) as Arc<dyn Sleeper>),
        ));

        let dispatcher = Arc::new(EventDispatcher::new(
            store.clone(),
            platform,
            notifier.clone(),
        ));
        let channel = RealtimeChannel::new(transport, dispatcher);

        let cancel = CancellationToken::new();
        let (delivery, bridge) = delivery::channel(config.bridge.queue_capacity, store.clone());
        let bridge_task = tokio::spawn(bridge.run(cancel.child_token()));
        let push_receiver = Arc::new(PushReceiver::new(notifier.clone(), delivery.clone()));

        let (session, _) = watch::channel(AuthSession::anonymous());

        info!(
            capacity = store.capacity(),
            restored = store.len(),
            "Notification context initialized"
        );

        Ok(NotificationContext {
            presenter: NotificationPresenter::new(store.clone()),
            store,
            channel,
            subscriptions,
            notifier,
            delivery,
            push_receiver,
            http_registry,
            realtime_enabled: config.realtime.enabled,
            session,
            cancel,
            bridge_task: Mutex::new(Some(bridge_task)),
        })
    }
}

/// One user's notification pipeline.
#[derive(Debug)]
pub struct NotificationContext {
    store: Arc<NotificationStore>,
    presenter: NotificationPresenter,
    channel: RealtimeChannel,
    subscriptions: Arc<SubscriptionManager>,
    notifier: Arc<dyn SystemNotifier>,
    delivery: DeliveryHandle,
    push_receiver: Arc<PushReceiver>,
    /// Receives the session token when the registry is the HTTP client.
    http_registry: Option<Arc<HttpRegistryClient>>,
    realtime_enabled: bool,
    session: watch::Sender<AuthSession>,
    cancel: CancellationToken,
    bridge_task: Mutex<Option<JoinHandle<usize>>>,
}

impl NotificationContext {
    pub fn builder(config: AppConfig) -> NotificationContextBuilder {
        NotificationContextBuilder {
            config,
            storage: None,
            platform: None,
            registry: None,
            transport: None,
            notifier: None,
            retry: None,
            sleeper: None,
        }
    }

    /// Apply a new authentication state.
    ///
    /// Authenticated sessions connect the user's channel (switching users
    /// tears down the previous one); anything else disconnects. Returns
    /// whether the channel is connected afterwards.
    pub async fn on_auth_change(&self, session: AuthSession) -> bool {
        if let Some(registry) = &self.http_registry {
            registry.set_token(session.token.clone());
        }
        self.session.send_replace(session.clone());

        match (&session.user_id, &session.token) {
            (Some(user_id), Some(token)) if session.is_authenticated() => {
                if !self.realtime_enabled {
                    debug!("Realtime channel disabled by configuration");
                    return false;
                }
                self.channel.connect(*user_id, token).await
            }
            _ => {
                self.channel.disconnect().await;
                false
            }
        }
    }

    /// Follow `sessions` until the context shuts down or the sender is dropped.
    pub fn watch_auth(self: &Arc<Self>, mut sessions: watch::Receiver<AuthSession>) -> JoinHandle<()> {
        let context = Arc::clone(self);
        tokio::spawn(async move {
            let initial = sessions.borrow_and_update().clone();
            context.on_auth_change(initial).await;

            loop {
                tokio::select! {
                    biased;
                    _ = context.cancel.cancelled() => break,
                    changed = sessions.changed() => {
                        if changed.is_err() {
                            debug!("Auth session source closed");
                            break;
                        }
                        let session = sessions.borrow_and_update().clone();
                        context.on_auth_change(session).await;
                    }
                }
            }
        })
    }

    /// Mark the notification read and return where it leads.
    pub fn open(&self, id: &NotificationId) -> Option<Route> {
        let record = self.store.get(id)?;
        self.store.mark_read(id);
        Some(self.presenter.route_for(&record))
    }

    /// Run `subscribe` detached; dropping the handle does not cancel it.
    pub fn spawn_subscribe(&self) -> JoinHandle<bool> {
        let subscriptions = Arc::clone(&self.subscriptions);
        tokio::spawn(async move { subscriptions.subscribe().await })
    }

    /// Run `unsubscribe` detached; dropping the handle does not cancel it.
    pub fn spawn_unsubscribe(&self) -> JoinHandle<bool> {
        let subscriptions = Arc::clone(&self.subscriptions);
        tokio::spawn(async move { subscriptions.unsubscribe().await })
    }

    /// Disconnect, stop the bridge after it drains, and stop auth watching.
    pub async fn shutdown(&self) {
        info!("Shutting down notification context");
        self.cancel.cancel();
        self.channel.disconnect().await;

        if let Some(task) = self.bridge_task.lock().await.take() {
            match task.await {
                Ok(delivered) => debug!(delivered, "Delivery bridge joined"),
                Err(e) => warn!(error = %e, "Delivery bridge ended abnormally"),
            }
        }
        info!("Notification context shut down");
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    pub fn presenter(&self) -> &NotificationPresenter {
        &self.presenter
    }

    pub fn channel(&self) -> &RealtimeChannel {
        &self.channel
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.connection_state()
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    pub fn notifier(&self) -> &Arc<dyn SystemNotifier> {
        &self.notifier
    }

    /// Producer handle of the background delivery bridge.
    pub fn delivery(&self) -> &DeliveryHandle {
        &self.delivery
    }

    pub fn push_receiver(&self) -> &Arc<PushReceiver> {
        &self.push_receiver
    }

    /// Last applied authentication state.
    pub fn session(&self) -> AuthSession {
        self.session.borrow().clone()
    }
}
