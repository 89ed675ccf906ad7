//! # taskhub-core
//!
//! Core crate for the TaskHub notifier. Contains configuration schemas,
//! typed identifiers, the authentication session handed in by the host
//! application, and the unified error system.
//!
//! This crate has **no** internal dependencies on other TaskHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
