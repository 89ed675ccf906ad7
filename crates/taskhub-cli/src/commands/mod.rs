//! CLI command definitions and dispatch.

pub mod config;
pub mod history;
pub mod push;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use taskhub_core::config::AppConfig;
use taskhub_core::error::AppError;

/// TaskHub notifier: notification history and push subscriptions
#[derive(Debug, Parser)]
#[command(name = "taskhub", version, about, long_about = None)]
pub struct Cli {
    /// Base configuration file, without extension
    #[arg(short, long, default_value = "config/default")]
    pub config: String,

    /// Environment overlay loaded from `config/<env>.toml`
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Notification history
    History(history::HistoryArgs),
    /// Push subscription lifecycle
    Push(push::PushArgs),
    /// Configuration
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = load_config(&self.config, &self.env)?;
        match &self.command {
            Commands::History(args) => history::execute(args, &config, self.format).await,
            Commands::Push(args) => push::execute(args, &config, self.format).await,
            Commands::Config(args) => config::execute(args, &config, self.format),
        }
    }
}

/// Helper: load configuration
pub fn load_config(base: &str, env: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(base, env)
        .map_err(|e| AppError::configuration(format!("Failed to load config: {}", e)))
}
