//! Error types for container engine calls.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors returned by a [`ContainerEngine`](super::ContainerEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine daemon could not be reached.
    #[error("Container engine not available: {reason}")]
    Unavailable {
        /// Reason why the engine is unavailable.
        reason: String,
    },

    /// The referenced container does not exist.
    #[error("No such container: {target}")]
    NotFound {
        /// Container name or ID as given by the caller.
        target: String,
    },

    /// An engine call was rejected or failed in transit.
    #[error("{operation} failed for '{target}': {reason}")]
    Request {
        /// Engine operation, e.g. "stop container".
        operation: &'static str,
        /// Container name, ID, image or volume the call was about.
        target: String,
        /// Reason for failure.
        reason: String,
    },
}

impl EngineError {
    /// Build a [`EngineError::Request`] for `operation` on `target`.
    pub fn request(
        operation: &'static str,
        target: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::Request {
            operation,
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}
