//! Error types for the Turnstile service.

use thiserror::Error;

/// Main error type for Turnstile operations.
///
/// The rate limiter itself never fails; these errors come from loading
/// configuration and running the HTTP server.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for TurnstileError {
    fn from(err: config::ConfigError) -> Self {
        TurnstileError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for TurnstileError {
    fn from(err: serde_yaml::Error) -> Self {
        TurnstileError::Config(format!("Failed to parse rate limit rules: {}", err))
    }
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
