//! Error types for the palaver core.

use thiserror::Error;

use crate::memory::StoreError;

/// Errors surfaced by invocation, memory, and settings operations.
///
/// Nothing is recovered locally: every failure reaches the caller, which owns
/// retry policy.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// The model endpoint rejected or failed the request.
    ///
    /// Wraps the client error unchanged; use `downcast_ref::<ClientError>()`
    /// on the inner value to inspect it.
    #[error("Endpoint error: {0}")]
    Endpoint(anyhow::Error),

    /// The conversation store could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// A tool response named a call id the latest assistant turn never requested.
    ///
    /// Only raised when tool-call validation is enabled on the memory.
    #[error("Unknown tool call id: {0}")]
    UnknownToolCall(String),

    /// Settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    /// Returns the client error behind an endpoint failure, if there is one.
    #[must_use]
    pub fn client_error(&self) -> Option<&palaver_client::ClientError> {
        match self {
            Self::Endpoint(err) => err.downcast_ref(),
            _ => None,
        }
    }
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;
