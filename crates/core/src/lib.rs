//! Campus Assistant Core Library
//!
//! This crate provides the foundational utilities shared by the retrieval
//! engine and the `campus` CLI:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, RetrievalSettings, StoreBackend};
pub use error::{AppError, AppResult};
