//! Configuration CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use taskhub_core::config::AppConfig;
use taskhub_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}

/// Execute config commands
pub fn execute(args: &ConfigArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut shown = config.clone();
            shown.auth.token = shown.auth.token.as_ref().map(|_| "****".to_string());
            output::print_item(&shown, format);
        }
    }

    Ok(())
}
