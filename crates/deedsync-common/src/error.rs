//! Error types for deedsync

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for deedsync bootstrap operations
pub type Result<T> = std::result::Result<T, DeedsyncError>;

/// Errors that stop a run before any work is dispatched.
///
/// Per-item failures never surface here; they become outcomes in the run
/// report instead.
#[derive(Error, Debug)]
pub enum DeedsyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Source root not found or not a directory: {}", .0.display())]
    SourceRoot(PathBuf),

    #[error("Logging error: {0}")]
    Logging(String),
}
