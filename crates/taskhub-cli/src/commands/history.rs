//! Notification history CLI commands.

use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use taskhub_core::config::AppConfig;
use taskhub_core::error::AppError;
use taskhub_realtime::notification::persistence::JsonFileStorage;
use taskhub_realtime::notification::record::NotificationId;
use taskhub_realtime::notification::{NotificationPresenter, NotificationStore};

/// Arguments for history commands
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// History subcommand
    #[command(subcommand)]
    pub command: HistoryCommand,
}

/// History subcommands
#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List notifications, newest first
    List {
        /// Only unread notifications
        #[arg(short, long)]
        unread: bool,
    },
    /// Mark one notification read
    MarkRead {
        /// Notification id
        id: String,
    },
    /// Mark every notification read
    MarkAllRead,
    /// Delete the whole history
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
    /// Mark a notification read and print where it leads
    Open {
        /// Notification id
        id: String,
    },
}

/// Notification display row for table output
#[derive(Debug, Serialize, Tabled)]
struct NotificationRow {
    id: String,
    kind: String,
    title: String,
    body: String,
    received: String,
    read: bool,
    route: String,
}

/// Execute history commands
pub async fn execute(
    args: &HistoryArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let storage = Arc::new(JsonFileStorage::new(&config.store.data_dir));
    let store = Arc::new(NotificationStore::from_config(&config.store, storage));
    let presenter = NotificationPresenter::new(store.clone());

    match &args.command {
        HistoryCommand::List { unread } => {
            let rows: Vec<NotificationRow> = presenter
                .records()
                .iter()
                .filter(|r| !*unread || !r.read)
                .map(|r| NotificationRow {
                    id: r.id.to_string(),
                    kind: r.kind.to_string(),
                    title: r.title.clone(),
                    body: r.body.clone(),
                    received: presenter.relative_time(r),
                    read: r.read,
                    route: presenter.route_for(r).path(),
                })
                .collect();

            output::print_list(&rows, format, "No notifications.");
            if format == OutputFormat::Table {
                output::print_kv("Unread", &presenter.unread_count().to_string());
            }
        }
        HistoryCommand::MarkRead { id } => {
            let id = NotificationId::new(id.as_str());
            if !store.contains(&id) {
                return Err(AppError::not_found(format!("Notification '{}' not found", id)));
            }
            if store.mark_read(&id) {
                output::print_success(&format!("Notification '{}' marked read", id));
            } else {
                output::print_warning(&format!("Notification '{}' was already read", id));
            }
        }
        HistoryCommand::MarkAllRead => {
            let changed = store.mark_all_read();
            output::print_success(&format!("{} notification(s) marked read", changed));
        }
        HistoryCommand::Clear { force } => {
            if store.is_empty() {
                output::print_warning("History is already empty");
                return Ok(());
            }

            if !force {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt(format!("Delete all {} notification(s)?", store.len()))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Prompt failed: {}", e)))?;

                if !confirmed {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            store.clear();
            output::print_success("Notification history cleared");
        }
        HistoryCommand::Open { id } => {
            let id = NotificationId::new(id.as_str());
            let record = store
                .get(&id)
                .ok_or_else(|| AppError::not_found(format!("Notification '{}' not found", id)))?;
            store.mark_read(&id);

            let route = presenter.route_for(&record);
            match format {
                OutputFormat::Table => output::print_kv("Route", &route.path()),
                OutputFormat::Json => output::print_item(&route, format),
            }
        }
    }

    Ok(())
}
