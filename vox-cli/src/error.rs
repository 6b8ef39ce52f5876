//! CLI Error Types

use thiserror::Error;
use vox_backend::BackendError;
use vox_demo::DemoError;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Demo sign-in rejected
    #[error("Authentication failed: {message}")]
    AuthenticationError { message: String },

    /// The operation ran but left work behind
    #[error("Incomplete: {message}")]
    Incomplete { message: String },

    /// Backend error
    #[error("Backend error: {0}")]
    BackendError(#[from] BackendError),

    /// Demo subsystem error
    #[error("Demo error: {0}")]
    DemoError(#[from] DemoError),

    /// JSON formatting error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        CliError::ConfigError {
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        CliError::AuthenticationError {
            message: message.into(),
        }
    }

    pub fn incomplete(message: impl Into<String>) -> Self {
        CliError::Incomplete {
            message: message.into(),
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigError { .. } => 1,
            CliError::AuthenticationError { .. } => 2,
            CliError::Incomplete { .. } => 3,
            CliError::BackendError(e) if e.is_rate_limited() => 5,
            CliError::BackendError(_) => 4,
            CliError::DemoError(DemoError::AuthenticationFailed(_)) => 2,
            CliError::DemoError(_) => 6,
            CliError::JsonError(_) => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("project id is not set");
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("project id"));
    }

    #[test]
    fn test_backend_exit_codes() {
        let limited = CliError::from(BackendError::RateLimited("429".into()));
        assert_eq!(limited.exit_code(), 5);
        let other = CliError::from(BackendError::Network("reset".into()));
        assert_eq!(other.exit_code(), 4);
    }

    #[test]
    fn test_demo_auth_failure_maps_to_auth_code() {
        let err = CliError::from(DemoError::AuthenticationFailed("bad password".into()));
        assert_eq!(err.exit_code(), 2);
    }
}
