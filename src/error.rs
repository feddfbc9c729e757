//! Custom error types for bookblend.
//!
//! Field-level extraction failures never show up here: a cell that does not
//! match its pattern becomes a missing value, not an error. These variants
//! cover structural failures only (network, malformed responses, missing
//! configuration), which propagate to the caller unchanged.

use thiserror::Error;

/// Main error type for bookblend operations.
#[derive(Debug, Error)]
pub enum BookblendError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTML parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status or API error code
        code: i32,
        /// Error message from the remote service
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `BookblendError`
pub type Result<T> = std::result::Result<T, BookblendError>;
