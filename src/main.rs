//! TaskHub Notifier: real-time notification daemon for one signed-in user.
//!
//! Wires the notification pipeline, follows the configured session and
//! keeps the realtime channel, the delivery bridge and the optional push
//! ingress running until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use taskhub_core::config::{AppConfig, LogFormat};
use taskhub_core::error::AppError;
use taskhub_realtime::bridge::ingress;
use taskhub_realtime::context::NotificationContext;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Notifier error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let base = std::env::var("TASKHUB_CONFIG").unwrap_or_else(|_| "config/default".to_string());
    let env = std::env::var("TASKHUB_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load(&base, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main daemon run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting TaskHub notifier v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Create data directories ──────────────────────────
    create_data_directories(&config).await?;

    // ── Step 2: Build the notification pipeline ──────────────────
    let context = Arc::new(NotificationContext::builder(config.clone()).build()?);

    let subscription = context.subscriptions().refresh().await;
    tracing::info!(
        supported = subscription.supported,
        permission = %subscription.permission,
        subscribed = subscription.subscribed,
        "Push subscription state"
    );

    // ── Step 3: Follow the session ───────────────────────────────
    let session = config.auth.session();
    if !session.is_authenticated() {
        tracing::warn!("No authenticated session configured, realtime channel stays closed");
    }
    let (session_tx, session_rx) = watch::channel(session);
    let auth_handle = context.watch_auth(session_rx);

    // ── Step 4: Start push ingress ───────────────────────────────
    let cancel = CancellationToken::new();
    let ingress_handle = match config.bridge.listen_addr.clone() {
        Some(addr) => {
            let receiver = Arc::clone(context.push_receiver());
            let ingress_cancel = cancel.child_token();
            Some(tokio::spawn(async move {
                if let Err(e) = ingress::serve(&addr, receiver, ingress_cancel).await {
                    tracing::error!("Push ingress error: {}", e);
                }
            }))
        }
        None => {
            tracing::info!("Push ingress disabled");
            None
        }
    };

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    cancel.cancel();
    drop(session_tx);
    if let Some(handle) = ingress_handle {
        join_within("push ingress", handle, SHUTDOWN_TIMEOUT).await;
    }
    join_within("session watcher", auth_handle, SHUTDOWN_TIMEOUT).await;
    context.shutdown().await;

    tracing::info!("TaskHub notifier shut down gracefully");
    Ok(())
}

/// Await a background task during shutdown, logging a failure or overrun.
async fn join_within<T>(name: &str, handle: JoinHandle<T>, limit: Duration) -> Option<T> {
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::warn!(task = name, "Task failed during shutdown: {}", e);
            None
        }
        Err(_) => {
            tracing::warn!(task = name, "Task did not stop within {:?}", limit);
            None
        }
    }
}

/// Create required data directories
async fn create_data_directories(config: &AppConfig) -> Result<(), AppError> {
    for dir in [&config.store.data_dir, &config.push.data_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::storage(format!("Failed to create dir '{}': {}", dir, e)))?;
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_within_returns_finished_value() {
        let handle = tokio::spawn(async { 7 });
        assert_eq!(join_within("ok", handle, SHUTDOWN_TIMEOUT).await, Some(7));
    }

    #[tokio::test]
    async fn test_join_within_reports_failed_task() {
        let handle = tokio::spawn(async { panic!("ingress crashed") });
        assert_eq!(join_within::<()>("failed", handle, SHUTDOWN_TIMEOUT).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_within_gives_up_after_limit() {
        let handle = tokio::spawn(std::future::pending::<()>());
        assert_eq!(join_within("stuck", handle, Duration::from_secs(1)).await, None);
    }
}
