//! Unified error handling for the senderos library.
//!
//! Repository-level failures (network, cache, parsing) and validation failures
//! all surface as [`SenderosError`]. State holders convert them to display
//! strings; nothing here is fatal to the process.

use thiserror::Error;

/// Unified error type for senderos operations.
#[derive(Debug, Error)]
pub enum SenderosError {
    /// No network and nothing cached to fall back on
    #[error("no connectivity and no cached data")]
    Offline,
    /// Routes endpoint answered with something other than 200
    #[error("server error: HTTP {status}")]
    Server { status: u16 },
    /// Response body was not a usable feature collection
    #[error("parse error: {0}")]
    Parse(String),
    /// Transport-level HTTP failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// SQLite cache failure
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),
    /// Cache schema migration failure
    #[error("migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),
    /// User input or navigation-eligibility failure
    #[error("{0}")]
    Validation(String),
    /// Identity provider or profile store failure
    #[error("{0}")]
    Provider(String),
    /// Async runtime could not be created
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl SenderosError {
    /// True for failures a retry might fix (everything except validation).
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SenderosError::Validation(_))
    }
}

/// Result type alias for senderos operations.
pub type Result<T> = std::result::Result<T, SenderosError>;
