//! RentLedger Common Library
//!
//! Shared code for the RentLedger API and notifier including:
//! - Typed records and their validation rules
//! - The document store abstraction and its backends
//! - Payment, property, tenant and notification workflows
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Push delivery and PDF rendering
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod pdf;
pub mod push;
pub mod services;

// Re-export commonly used types
pub use auth::Caller;
pub use config::AppConfig;
pub use db::{DocumentStore, SharedStore};
pub use errors::{AppError, Result};
pub use push::PushSender;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
