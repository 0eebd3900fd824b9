// src/error.rs
// Standardized error types for the engram library

use thiserror::Error;

/// Main error type for the engram library.
///
/// Lookups that simply find nothing are not errors: they return
/// `Ok(None)` or an empty vec. `StorageUnavailable` marks mutations
/// attempted against a store that was unreachable at startup.
#[derive(Error, Debug)]
pub enum EngramError {
    #[error("backing store unavailable")]
    StorageUnavailable,

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Result using EngramError
pub type Result<T> = std::result::Result<T, EngramError>;

impl EngramError {
    /// True when the error only signals a degraded (storeless) engine.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, EngramError::StorageUnavailable)
    }
}
