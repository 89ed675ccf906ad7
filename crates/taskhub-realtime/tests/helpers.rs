//! Shared helpers for pipeline integration tests.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use taskhub_core::config::AppConfig;
use taskhub_realtime::channel::fake::FakeTransport;
use taskhub_realtime::context::NotificationContext;
use taskhub_realtime::notification::notifier::TagCollapsingNotifier;
use taskhub_realtime::notification::persistence::JsonFileStorage;
use taskhub_realtime::subscription::fake::{FakePushPlatform, FakeRegistry};

/// A context wired to fakes, persisting history under a temp directory.
pub struct TestPipeline {
    pub context: NotificationContext,
    pub transport: Arc<FakeTransport>,
    pub platform: Arc<FakePushPlatform>,
    pub registry: Arc<FakeRegistry>,
    pub notifier: Arc<TagCollapsingNotifier>,
    pub dir: TempDir,
}

impl TestPipeline {
    /// Pipeline with a fresh temp directory.
    pub fn new(platform: FakePushPlatform) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        Self::in_dir(dir, platform)
    }

    /// Pipeline reusing `dir`, e.g. to simulate a restart.
    pub fn in_dir(dir: TempDir, platform: FakePushPlatform) -> Self {
        let transport = Arc::new(FakeTransport::new());
        let platform = Arc::new(platform);
        let registry = Arc::new(FakeRegistry::new());
        let notifier = Arc::new(TagCollapsingNotifier::new());

        let context = NotificationContext::builder(AppConfig::default())
            .storage(Arc::new(JsonFileStorage::new(dir.path())))
            .platform(platform.clone())
            .registry(registry.clone())
            .transport(transport.clone())
            .notifier(notifier.clone())
            .build()
            .expect("Failed to build notification context");

        Self {
            context,
            transport,
            platform,
            registry,
            notifier,
            dir,
        }
    }

    /// Shut the context down and hand back its directory.
    pub async fn stop(self) -> TempDir {
        self.context.shutdown().await;
        self.dir
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
