//! Demo Subsystem Error Types

use thiserror::Error;
use tracing::warn;
use vox_backend::BackendError;
use vox_core::CoreError;

/// Demo subsystem errors
#[derive(Error, Debug)]
pub enum DemoError {
    /// Backend call failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Malformed record
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Session could not be created
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
}

/// Demo result type
pub type DemoResult<T> = Result<T, DemoError>;

impl DemoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DemoError::Backend(e) if e.is_not_found())
    }

    pub fn is_rate_limited(&self) -> bool {
        match self {
            DemoError::Backend(e) => e.is_rate_limited(),
            other => other.to_string().to_ascii_lowercase().contains("rate limit"),
        }
    }
}

/// Log a failure at `warn` and continue without the value.
///
/// Used wherever bookkeeping must never block the caller. Rate-limit
/// rejections get their own message so they stand out in the logs.
pub trait LogAndDrop<T> {
    fn log_and_drop(self, context: &str) -> Option<T>;
}

impl<T, E> LogAndDrop<T> for Result<T, E>
where
    E: Into<DemoError>,
{
    fn log_and_drop(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                let e: DemoError = e.into();
                if e.is_rate_limited() {
                    warn!(context = %context, error = %e, "Rate limited by backend, continuing");
                } else {
                    warn!(context = %context, error = %e, "Operation failed, continuing");
                }
                None
            }
        }
    }
}
