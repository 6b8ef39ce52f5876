//! Backend Error Types
//!
//! Classification matters more than detail here: callers treat "not found" as
//! success when undoing, and log rate-limit rejections distinctly.

use thiserror::Error;

/// Backend errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Document, file, collection or session not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected by the platform's per-identity quota
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Missing or insufficient credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Object already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation not offered by this backend
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any other error response
    #[error("Backend error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Backend result type
pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    /// Map an HTTP status and message to an error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => BackendError::NotFound(message),
            429 => BackendError::RateLimited(message),
            401 | 403 => BackendError::Unauthorized(message),
            409 => BackendError::Conflict(message),
            _ if mentions_rate_limit(&message) => BackendError::RateLimited(message),
            _ => BackendError::Api { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }

    /// HTTP 429, or any error whose message mentions a rate limit
    pub fn is_rate_limited(&self) -> bool {
        match self {
            BackendError::RateLimited(_) => true,
            BackendError::Api { status: 429, .. } => true,
            other => mentions_rate_limit(&other.to_string()),
        }
    }
}

fn mentions_rate_limit(message: &str) -> bool {
    message.to_ascii_lowercase().contains("rate limit")
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return BackendError::from_status(status.as_u16(), e.to_string());
        }
        if e.is_decode() {
            return BackendError::Serialization(e.to_string());
        }
        BackendError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Serialization(e.to_string())
    }
}
