//! Error types for relbot

use std::time::Duration;

use thiserror::Error;

/// Result type alias for relbot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for relbot operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Webhook payload is missing fields or has the wrong shape
    #[error("Malformed {event} payload: {reason}")]
    MalformedPayload {
        /// Event type tag
        event: String,
        /// What was wrong with it
        reason: String,
    },

    /// Gave up waiting for a named lock
    #[error("Timed out after {waited:?} waiting for lock '{name}'")]
    LockTimeout {
        /// Lock name (repository full name)
        name: String,
        /// How long we waited
        waited: Duration,
    },

    /// Local git operation failed
    #[error("Git error: {0}")]
    Git(String),

    /// Hosting platform API call failed
    #[error("Remote API error: {0}")]
    Remote(String),

    /// Release pipeline failed
    #[error("Release error: {0}")]
    Release(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a malformed-payload error for an event type
    pub fn malformed(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedPayload {
            event: event.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller should retry the delivery later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LockTimeout { .. })
    }

    /// Whether the failure was caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::MalformedPayload { .. })
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Error::Git(err.message().to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Other(format!("Background task failed: {}", err))
    }
}
