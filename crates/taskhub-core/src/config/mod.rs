//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every section has defaults so a missing file still yields
//! a usable configuration.

pub mod auth;
pub mod bridge;
pub mod logging;
pub mod push;
pub mod realtime;
pub mod registry;
pub mod store;

use serde::{Deserialize, Serialize};

pub use self::auth::AuthConfig;
pub use self::bridge::BridgeConfig;
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::push::PushConfig;
pub use self::realtime::RealtimeConfig;
pub use self::registry::RegistryConfig;
pub use self::store::StoreConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// (`default.toml` + environment overlay + `TASKHUB__*` variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Realtime channel settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Notification registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Native push platform settings.
    #[serde(default)]
    pub push: PushConfig,
    /// Notification history settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Background delivery settings.
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Identity the daemon runs as.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `base` (e.g. `config/default`) with the `config/<env>` overlay
    /// and environment variables prefixed with `TASKHUB__`. Missing files
    /// are skipped.
    pub fn load(base: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(base).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("TASKHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Load a single TOML file without overlays or environment variables.
    pub fn load_file(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
