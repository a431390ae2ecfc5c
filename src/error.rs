//! Error types for expwatch
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while watching experiments
#[derive(Debug, Error)]
pub enum WatchError {
    /// Experiment config document could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(String),

    /// An existing sentence file could not be read
    #[error("Read error: {0}")]
    Read(String),

    /// The lock artifact could not be written or removed
    #[error("Lock persistence error: {0}")]
    LockPersistence(String),

    /// The watched root folder is missing or unreadable
    #[error("Root folder unavailable: {0}")]
    RootUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WatchError {
    /// Errors scoped to a single experiment; the watch loop keeps going after these
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, WatchError::RootUnavailable(_))
    }
}

/// Result type alias for expwatch operations
pub type Result<T> = std::result::Result<T, WatchError>;
