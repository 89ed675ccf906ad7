//! Error taxonomy of the notification pipeline.

use thiserror::Error;

use taskhub_core::error::{AppError, ErrorKind};

/// Failures surfaced by the notification components.
///
/// Public operations mostly record these in observable state instead of
/// returning them; see each component for its propagation policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// The user declined the permission prompt.
    #[error("PermissionDenied: notification permission was not granted")]
    PermissionDenied,
    /// Push subscription could not be established after retries.
    #[error("SubscriptionFailed: {0}")]
    SubscriptionFailed(String),
    /// The realtime connection failed to establish or dropped.
    #[error("TransportError: {0}")]
    Transport(String),
    /// Persisted history could not be parsed.
    #[error("PersistenceCorrupt: {0}")]
    PersistenceCorrupt(String),
    /// Service worker, push or notification APIs are unavailable.
    #[error("Unsupported: push notifications are not supported on this platform")]
    Unsupported,
    /// No local push subscription exists.
    #[error("NoActiveSubscription: no active push subscription found")]
    NoActiveSubscription,
    /// The notification registry rejected or failed a call.
    #[error("RegistryError: {message}")]
    Registry {
        /// Description of the failure.
        message: String,
        /// Whether retrying may succeed.
        transient: bool,
    },
    /// The push platform failed a call.
    #[error("PlatformError: {message}")]
    Platform {
        /// Description of the failure.
        message: String,
        /// Whether retrying may succeed.
        transient: bool,
    },
    /// Reading or writing persisted state failed.
    #[error("StorageError: {0}")]
    Storage(String),
    /// The background delivery queue is closed or full.
    #[error("BridgeClosed: {0}")]
    BridgeClosed(String),
}

impl NotifyError {
    /// Transient registry failure.
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
            transient: true,
        }
    }

    /// Registry failure that retrying will not fix.
    pub fn registry_rejected(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
            transient: false,
        }
    }

    /// Transient platform failure.
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
            transient: true,
        }
    }

    /// Platform failure that retrying will not fix.
    pub fn platform_fatal(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
            transient: false,
        }
    }

    /// Whether the subscribe retry loop should try again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Registry { transient, .. } | Self::Platform { transient, .. } => *transient,
            Self::Transport(_) => true,
            _ => false,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "PermissionDenied",
            Self::SubscriptionFailed(_) => "SubscriptionFailed",
            Self::Transport(_) => "TransportError",
            Self::PersistenceCorrupt(_) => "PersistenceCorrupt",
            Self::Unsupported => "Unsupported",
            Self::NoActiveSubscription => "NoActiveSubscription",
            Self::Registry { .. } => "RegistryError",
            Self::Platform { .. } => "PlatformError",
            Self::Storage(_) => "StorageError",
            Self::BridgeClosed(_) => "BridgeClosed",
        }
    }
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        let kind = match &err {
            NotifyError::PermissionDenied => ErrorKind::Permission,
            NotifyError::Unsupported => ErrorKind::Unsupported,
            NotifyError::NoActiveSubscription => ErrorKind::NotFound,
            NotifyError::PersistenceCorrupt(_) | NotifyError::Storage(_) => ErrorKind::Storage,
            NotifyError::BridgeClosed(_) => ErrorKind::ServiceUnavailable,
            NotifyError::SubscriptionFailed(_)
            | NotifyError::Transport(_)
            | NotifyError::Registry { .. }
            | NotifyError::Platform { .. } => ErrorKind::ExternalService,
        };
        AppError::new(kind, err.to_string())
    }
}

/// Result alias for pipeline operations.
pub type NotifyResult<T> = Result<T, NotifyError>;
