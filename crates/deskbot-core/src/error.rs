//! Error types for Deskbot core.

use thiserror::Error;

/// Errors raised by configuration and upstream clients.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required setting is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Upstream answered with a non-success status.
    #[error("Jira API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or error summary.
        message: String,
    },

    /// Upstream payload could not be parsed.
    #[error("Unexpected response: {0}")]
    ResponseParse(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::Http(e.to_string())
    }
}

impl From<url::ParseError> for CoreError {
    fn from(e: url::ParseError) -> Self {
        CoreError::Configuration(format!("invalid URL: {}", e))
    }
}
