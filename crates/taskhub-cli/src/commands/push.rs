//! Push subscription CLI commands.

use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::output::{self, OutputFormat};
use taskhub_core::config::AppConfig;
use taskhub_core::error::AppError;
use taskhub_realtime::subscription::retry::{RetryPolicy, TokioSleeper};
use taskhub_realtime::subscription::{HttpRegistryClient, NativePushPlatform, SubscriptionManager};

/// Arguments for push commands
#[derive(Debug, Args)]
pub struct PushArgs {
    /// Push subcommand
    #[command(subcommand)]
    pub command: PushCommand,
}

/// Push subcommands
#[derive(Debug, Subcommand)]
pub enum PushCommand {
    /// Show support, permission and subscription state
    Status,
    /// Ask for permission if needed and subscribe
    Subscribe,
    /// Unregister and remove the local subscription
    Unsubscribe,
    /// Ask the backend to send a test notification
    Test,
    /// Number of subscriptions registered for the user
    Count,
}

#[derive(Debug, Serialize)]
struct PushStatus {
    supported: bool,
    permission: String,
    subscribed: bool,
    subscriptions_count: u64,
}

/// Execute push commands
pub async fn execute(
    args: &PushArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let registry = Arc::new(HttpRegistryClient::new(config.registry.clone())?);
    registry.set_token(config.auth.token.clone());
    let manager = SubscriptionManager::with_retry(
        Arc::new(NativePushPlatform::new(config.push.clone())),
        registry,
        RetryPolicy::from_config(&config.registry),
        Arc::new(TokioSleeper),
    );

    match &args.command {
        PushCommand::Status => {
            let state = manager.refresh().await;
            let status = PushStatus {
                supported: state.supported,
                permission: state.permission.to_string(),
                subscribed: state.subscribed,
                subscriptions_count: manager.subscriptions_count().await,
            };
            match format {
                OutputFormat::Table => {
                    output::print_kv("Supported", &status.supported.to_string());
                    output::print_kv("Permission", &status.permission);
                    output::print_kv("Subscribed", &status.subscribed.to_string());
                    output::print_kv(
                        "Registered devices",
                        &status.subscriptions_count.to_string(),
                    );
                }
                OutputFormat::Json => output::print_item(&status, format),
            }
        }
        PushCommand::Subscribe => {
            if !manager.subscribe().await {
                return Err(failure(&manager, "Subscribe failed"));
            }
            output::print_success("Push notifications enabled");
        }
        PushCommand::Unsubscribe => {
            if !manager.unsubscribe().await {
                return Err(failure(&manager, "Unsubscribe failed"));
            }
            output::print_success("Push notifications disabled");
        }
        PushCommand::Test => {
            if !manager.send_test().await {
                return Err(failure(&manager, "Test notification failed"));
            }
            output::print_success("Test notification sent");
        }
        PushCommand::Count => {
            let count = manager.subscriptions_count().await;
            match format {
                OutputFormat::Table => output::print_kv("Registered devices", &count.to_string()),
                OutputFormat::Json => output::print_item(&serde_json::json!({ "count": count }), format),
            }
        }
    }

    Ok(())
}

/// Error recorded by the last manager operation.
fn failure(manager: &SubscriptionManager, fallback: &str) -> AppError {
    manager
        .state()
        .error
        .map(AppError::from)
        .unwrap_or_else(|| AppError::internal(fallback))
}
