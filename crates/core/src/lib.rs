//! Lingua RAG Core Library
//!
//! This crate provides the foundational utilities shared by every Lingua crate:
//! - Error taxonomy (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Application configuration

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, Overrides};
pub use error::{AppError, AppResult};
