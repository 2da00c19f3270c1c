//! Error types for the webhook adapter.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling a Monday.com notification.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inbound payload failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Webhook signature rejected
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Transport-level failure talking to an outbound API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Outbound API answered with an error
    #[error("Upstream API error: {0}")]
    Upstream(String),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::Serialization(_) => 400,
            Error::Auth(_) => 401,
            _ => 500,
        }
    }
}
