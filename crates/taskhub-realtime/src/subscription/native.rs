//! Push platform backed by local files and the terminal.
//!
//! Permission and the current subscription live as JSON documents in the
//! configured data directory. The one-time permission prompt is a terminal
//! confirmation. Subscriptions carry a freshly generated P-256 key pair and
//! a 16-byte auth secret, like a browser push manager would mint.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use p256::elliptic_curve::rand_core::{OsRng, RngCore};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use taskhub_core::config::PushConfig;

use crate::error::{NotifyError, NotifyResult};

use super::platform::{
    PermissionState, PlatformCapabilities, PushPlatform, PushSubscription, SubscriptionKeys,
};

const PERMISSION_FILE: &str = "permission.json";
const SUBSCRIPTION_FILE: &str = "subscription.json";
const WORKER_FILE: &str = "worker.json";

#[derive(Debug, Serialize, Deserialize)]
struct PermissionDocument {
    permission: PermissionState,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WorkerDocument {
    registered_at: DateTime<Utc>,
}

/// Persisted subscription with its private half.
#[derive(Debug, Serialize, Deserialize)]
struct SubscriptionDocument {
    subscription: PushSubscription,
    application_server_key: String,
    private_key: String,
    created_at: DateTime<Utc>,
}

/// Push platform for a host without a browser.
#[derive(Debug, Clone)]
pub struct NativePushPlatform {
    config: PushConfig,
    data_dir: PathBuf,
}

impl NativePushPlatform {
    pub fn new(config: PushConfig) -> Self {
        let data_dir = PathBuf::from(&config.data_dir);
        Self { config, data_dir }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    fn write_permission(&self, permission: PermissionState) -> NotifyResult<()> {
        write_json(
            &self.path(PERMISSION_FILE),
            &PermissionDocument {
                permission,
                updated_at: Utc::now(),
            },
        )
    }

    async fn ask(&self) -> NotifyResult<PermissionState> {
        if !self.config.interactive {
            debug!("Permission prompt unavailable in non-interactive mode");
            return Ok(PermissionState::Default);
        }

        let answer = tokio::task::spawn_blocking(|| {
            dialoguer::Confirm::new()
                .with_prompt("Allow TaskHub to show notifications?")
                .default(false)
                .interact()
        })
        .await
        .map_err(|e| NotifyError::platform_fatal(format!("prompt task failed: {e}")))?
        .map_err(|e| NotifyError::platform_fatal(format!("prompt failed: {e}")))?;

        Ok(if answer {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        })
    }
}

#[async_trait]
impl PushPlatform for NativePushPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities {
            worker: self.config.worker_available,
            push: self.config.push_available,
            notifications: self.config.notifications_available,
        }
    }

    async fn permission(&self) -> PermissionState {
        match read_json::<PermissionDocument>(&self.path(PERMISSION_FILE)) {
            Ok(Some(doc)) => doc.permission,
            Ok(None) => PermissionState::Default,
            Err(e) => {
                warn!(error = %e, "Unreadable permission state, treating as not asked");
                PermissionState::Default
            }
        }
    }

    async fn prompt_permission(&self) -> NotifyResult<PermissionState> {
        let answer = self.ask().await?;
        if answer != PermissionState::Default {
            self.write_permission(answer)?;
            info!(permission = %answer, "Notification permission answered");
        }
        Ok(answer)
    }

    async fn register_worker(&self) -> NotifyResult<()> {
        write_json(
            &self.path(WORKER_FILE),
            &WorkerDocument {
                registered_at: Utc::now(),
            },
        )
    }

    async fn get_subscription(&self) -> NotifyResult<Option<PushSubscription>> {
        Ok(read_json::<SubscriptionDocument>(&self.path(SUBSCRIPTION_FILE))?
            .map(|doc| doc.subscription))
    }

    async fn subscribe(&self, application_server_key: &[u8]) -> NotifyResult<PushSubscription> {
        p256::PublicKey::from_sec1_bytes(application_server_key)
            .map_err(|_| NotifyError::platform_fatal("application server key is not a P-256 point"))?;

        let secret = p256::SecretKey::random(&mut OsRng);
        let public = secret.public_key().to_encoded_point(false);
        let mut auth = [0u8; 16];
        OsRng.fill_bytes(&mut auth);

        let subscription = PushSubscription {
            endpoint: format!(
                "{}/{}",
                self.config.push_service_url.trim_end_matches('/'),
                uuid::Uuid::new_v4()
            ),
            keys: SubscriptionKeys {
                auth: URL_SAFE_NO_PAD.encode(auth),
                p256dh: URL_SAFE_NO_PAD.encode(public.as_bytes()),
            },
        };

        write_json(
            &self.path(SUBSCRIPTION_FILE),
            &SubscriptionDocument {
                subscription: subscription.clone(),
                application_server_key: URL_SAFE_NO_PAD.encode(application_server_key),
                private_key: URL_SAFE_NO_PAD.encode(secret.to_bytes()),
                created_at: Utc::now(),
            },
        )?;

        info!(endpoint = %subscription.endpoint, "Push subscription created");
        Ok(subscription)
    }

    async fn unsubscribe(&self) -> NotifyResult<bool> {
        match std::fs::remove_file(self.path(SUBSCRIPTION_FILE)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(NotifyError::platform(format!(
                "failed to remove subscription: {e}"
            ))),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> NotifyResult<Option<T>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(NotifyError::Storage(format!(
                "failed to read '{}': {e}",
                path.display()
            )));
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| NotifyError::Storage(format!("invalid '{}': {e}", path.display())))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> NotifyResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| NotifyError::platform(format!("failed to create '{}': {e}", parent.display())))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| NotifyError::platform_fatal(format!("failed to encode state: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .and_then(|_| std::fs::rename(&tmp, path))
        .map_err(|e| NotifyError::platform(format!("failed to write '{}': {e}", path.display())))
}
