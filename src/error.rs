//! Error types for Hitguard.

use thiserror::Error;

/// Main error type for Hitguard operations.
#[derive(Error, Debug)]
pub enum HitguardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The client identity could not be derived from the request
    #[error("Key extraction error: {0}")]
    KeyExtraction(String),

    /// Hit store backend errors
    #[error("Store error: {0}")]
    Store(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Hitguard operations.
pub type Result<T> = std::result::Result<T, HitguardError>;
