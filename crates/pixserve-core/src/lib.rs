//! Pixserve Core Library
//!
//! This crate provides the domain models, error types, configuration, and
//! cache-key derivation shared across all pixserve components. It performs
//! no I/O.

pub mod cache_key;
pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use cache_key::{derive_cache_key, folder_key_prefix};
pub use config::Config;
pub use error::AppError;
pub use models::{
    CacheEntry, Dimensions, FolderSummary, OutputFormat, ProcessedResult, ResizeOutcome,
    ResultRecord, SourceFile,
};
