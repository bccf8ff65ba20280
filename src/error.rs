//! Error types for the memory context manager

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {

    // =============================
    // Configuration Errors (fatal)
    // =============================

    #[error("Memory config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Memory config malformed: {0}")]
    ConfigMalformed(String),

    // =============================
    // Store Errors (degraded locally)
    // =============================

    #[error("Memory store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Memory store rejected request ({status}): {message}")]
    StoreRejected { status: u16, message: String },

    #[error("Memory store call timed out")]
    StoreTimeout,

    // =============================
    // Normalization Errors (per message)
    // =============================

    #[error("Unclassifiable message: {0}")]
    InvalidMessage(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MemoryError {
    /// Configuration errors make the deployment unusable; everything else
    /// is absorbed by the manager.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MemoryError::ConfigNotFound(_) | MemoryError::ConfigMalformed(_)
        )
    }
}
