//! Core type definitions used across the TaskHub workspace.

pub mod auth;
pub mod id;

pub use auth::AuthSession;
pub use id::*;
