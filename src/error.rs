//! Error types for the bulletin monitor crate

use thiserror::Error;

/// Result type for bulletin monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for bulletin monitor operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Fetching or link discovery error
    #[error("Crawl error: {0}")]
    Crawl(String),

    /// Content extraction error
    #[error("Extract error: {0}")]
    Extract(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Rules or settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
