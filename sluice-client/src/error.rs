//! Error types for the Sluice client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by [`crate::OrchestratorClient`]
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never got a response (connection refused, timeout, ...)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The orchestrator answered with an unexpected error status
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The response body did not match the expected type
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// 404 from the orchestrator
    #[error("Not found: {0}")]
    NotFound(String),

    /// 400 from the orchestrator, e.g. a rejected push notification
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ApiError { status: 404, .. })
    }

    /// Whether retrying the same request might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(e) => e.is_connect() || e.is_timeout(),
            Self::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
