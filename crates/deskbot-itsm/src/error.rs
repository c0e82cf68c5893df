//! Error types for the request flow.
//!
//! User mistakes and upstream failures are reported to the chat and never
//! surface here; these are the failures the host has to deal with.

use thiserror::Error;

/// Errors that can occur while driving a conversation.
#[derive(Debug, Error)]
pub enum ItsmError {
    /// Sending a message to the chat failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The conversation store failed. The in-memory store never fails;
    /// stores backed by a database or cache report their errors here.
    #[error("Store error: {0}")]
    Store(String),
}

/// Result type for request flow operations.
pub type Result<T> = std::result::Result<T, ItsmError>;
