//! Remote notification registry: VAPID key and subscription bookkeeping.

use std::fmt::Debug;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use taskhub_core::config::RegistryConfig;

use crate::error::{NotifyError, NotifyResult};

use super::platform::PushSubscription;

/// Registry calls used by the subscription manager.
#[async_trait]
pub trait NotificationRegistry: Send + Sync + Debug {
    /// Public application server key, URL-safe base64.
    async fn vapid_public_key(&self) -> NotifyResult<String>;

    /// Register a subscription for the current user.
    async fn register(&self, subscription: &PushSubscription) -> NotifyResult<()>;

    /// Forget the subscription with `endpoint`.
    async fn unregister(&self, endpoint: &str) -> NotifyResult<()>;

    /// Ask the backend to push one test notification.
    async fn send_test(&self) -> NotifyResult<bool>;

    /// Number of subscriptions registered for the current user.
    async fn subscriptions_count(&self) -> NotifyResult<u64>;
}

#[derive(Debug, Serialize)]
struct SubscribeBody<'a> {
    endpoint: &'a str,
    auth_key: &'a str,
    p256dh_key: &'a str,
}

#[derive(Debug, Serialize)]
struct UnsubscribeBody<'a> {
    endpoint: &'a str,
}

#[derive(Debug, Deserialize)]
struct VapidKeyResponse {
    #[serde(default)]
    vapid_public_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TestResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    #[serde(default)]
    subscriptions_count: u64,
}

/// REST client for the notification registry.
#[derive(Debug)]
pub struct HttpRegistryClient {
    config: RegistryConfig,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl HttpRegistryClient {
    pub fn new(config: RegistryConfig) -> NotifyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(|e| NotifyError::registry_rejected(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http,
            token: RwLock::new(None),
        })
    }

    /// Bearer token sent with authenticated calls.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(reqwest::header::ACCEPT, "application/json");
        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, what: &str, builder: reqwest::RequestBuilder) -> NotifyResult<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| NotifyError::registry(format!("{what} request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = format!("{what} returned {status}");
        if is_transient_status(status) {
            Err(NotifyError::registry(message))
        } else {
            Err(NotifyError::registry_rejected(message))
        }
    }
}

/// Server errors, throttling and timeouts may succeed on retry.
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

#[async_trait]
impl NotificationRegistry for HttpRegistryClient {
    async fn vapid_public_key(&self) -> NotifyResult<String> {
        let url = self.config.vapid_key_url();
        let response = self.send("vapid-key", self.http.get(&url)).await?;
        let body: VapidKeyResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::registry(format!("invalid vapid-key response: {e}")))?;

        body.vapid_public_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| NotifyError::registry_rejected("registry has no VAPID public key"))
    }

    async fn register(&self, subscription: &PushSubscription) -> NotifyResult<()> {
        let url = self.config.api_url("/notifications/subscribe");
        let body = SubscribeBody {
            endpoint: &subscription.endpoint,
            auth_key: &subscription.keys.auth,
            p256dh_key: &subscription.keys.p256dh,
        };
        self.send("subscribe", self.authed(self.http.post(&url)).json(&body))
            .await?;
        debug!(endpoint = %subscription.endpoint, "Subscription registered");
        Ok(())
    }

    async fn unregister(&self, endpoint: &str) -> NotifyResult<()> {
        let url = self.config.api_url("/notifications/unsubscribe");
        self.send(
            "unsubscribe",
            self.authed(self.http.post(&url)).json(&UnsubscribeBody { endpoint }),
        )
        .await?;
        Ok(())
    }

    async fn send_test(&self) -> NotifyResult<bool> {
        let url = self.config.api_url("/notifications/test");
        let response = self.send("test", self.authed(self.http.post(&url))).await?;
        let body: TestResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::registry(format!("invalid test response: {e}")))?;
        Ok(body.success)
    }

    async fn subscriptions_count(&self) -> NotifyResult<u64> {
        let url = self.config.api_url("/notifications/subscriptions-count");
        let response = self
            .send("subscriptions-count", self.authed(self.http.get(&url)))
            .await?;
        let body: CountResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::registry(format!("invalid count response: {e}")))?;
        Ok(body.subscriptions_count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;
    use crate::subscription::platform::SubscriptionKeys;

    #[derive(Clone, Default)]
    struct Seen {
        bodies: Arc<Mutex<Vec<(String, Value, Option<String>)>>>,
    }

    impl Seen {
        fn record(&self, path: &str, headers: &HeaderMap, body: Value) {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.bodies
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((path.to_string(), body, auth));
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    fn client(base_url: String) -> HttpRegistryClient {
        let config = RegistryConfig {
            base_url,
            ..RegistryConfig::default()
        };
        let client = HttpRegistryClient::new(config).expect("client");
        client.set_token(Some("secret".to_string()));
        client
    }

    #[tokio::test]
    async fn test_registry_round_trips() {
        let seen = Seen::default();
        let router = Router::new()
            .route(
                "/vapid-key",
                get(|| async { Json(json!({"vapid_public_key": "BKey"})) }),
            )
            .route(
                "/api/notifications/subscribe",
                post(
                    |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                        seen.record("subscribe", &headers, body);
                        Json(json!({"message": "ok"}))
                    },
                ),
            )
            .route(
                "/api/notifications/unsubscribe",
                post(
                    |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                        seen.record("unsubscribe", &headers, body);
                        Json(json!({"message": "ok"}))
                    },
                ),
            )
            .route(
                "/api/notifications/test",
                post(|| async { Json(json!({"success": true})) }),
            )
            .route(
                "/api/notifications/subscriptions-count",
                get(|| async { Json(json!({"subscriptions_count": 2})) }),
            )
            .with_state(seen.clone());

        let client = client(serve(router).await);
        assert_eq!(client.vapid_public_key().await.expect("key"), "BKey");

        let subscription = PushSubscription {
            endpoint: "https://push.example/abc".to_string(),
            keys: SubscriptionKeys {
                auth: "auth".to_string(),
                p256dh: "p256".to_string(),
            },
        };
        client.register(&subscription).await.expect("register");
        client.unregister(&subscription.endpoint).await.expect("unregister");
        assert!(client.send_test().await.expect("test"));
        assert_eq!(client.subscriptions_count().await.expect("count"), 2);

        let bodies = seen.bodies.lock().unwrap_or_else(|e| e.into_inner()).clone();
        assert_eq!(bodies.len(), 2);
        assert_eq!(
            bodies[0].1,
            json!({"endpoint": "https://push.example/abc", "auth_key": "auth", "p256dh_key": "p256"})
        );
        assert_eq!(bodies[0].2.as_deref(), Some("Bearer secret"));
        assert_eq!(bodies[1].1, json!({"endpoint": "https://push.example/abc"}));
    }

    #[tokio::test]
    async fn test_status_classification() {
        let router = Router::new()
            .route(
                "/api/notifications/subscribe",
                post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "busy") }),
            )
            .route(
                "/api/notifications/unsubscribe",
                post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "no") }),
            );
        let client = client(serve(router).await);

        let subscription = PushSubscription {
            endpoint: "e".to_string(),
            keys: SubscriptionKeys {
                auth: "a".to_string(),
                p256dh: "p".to_string(),
            },
        };
        assert!(client.register(&subscription).await.unwrap_err().is_transient());
        assert!(!client.unregister("e").await.unwrap_err().is_transient());
        // No route: 404 is not worth retrying.
        assert!(!client.vapid_public_key().await.unwrap_err().is_transient());
    }
}
