//! Error types for the client library.

use serde::Deserialize;
use thiserror::Error;

/// Error body returned by OpenAI-compatible endpoints.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// The error detail object from the API.
    pub error: ErrorDetail,
}

/// Detailed error information from the API.
#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    /// The error message text describing what went wrong.
    pub message: String,
}

/// Errors that can occur when talking to a chat-completion endpoint.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Network or HTTP request failure.
    ///
    /// DNS resolution, connection failures, socket errors, timeouts.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Middleware layer error, e.g. from the retry policy.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// API authentication failure (HTTP 401).
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limit exceeded")]
    RateLimitError,

    /// Client configuration issue, such as an unparseable base URL.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The request was rejected before or by the endpoint as malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The endpoint answered with data that doesn't match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other non-success HTTP status.
    #[error("Request failed with status {status}: {message}")]
    RequestError {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the body.
        message: String,
    },

    /// API service unavailable (5xx errors).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Tools requested but not supported by this client.
    #[error("Tool execution not supported")]
    ToolsNotSupported,

    /// Temperature must be between 0.0 and 2.0.
    #[error("Temperature must be between 0.0 & 2.0")]
    InvalidTemperature,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_errors_carry_status_and_message() {
        let err = ClientError::RequestError {
            status: 418,
            message: "teapot".into(),
        };
        assert_eq!(err.to_string(), "Request failed with status 418: teapot");
        assert_eq!(ClientError::RateLimitError.to_string(), "Rate limit exceeded");
    }
}
