//! Error types for Vox Core

use thiserror::Error;

/// Core errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A tracked change record is missing a field its kind requires
    #[error("Tracked change {id} ({kind}) is missing field `{field}`")]
    MissingField {
        id: String,
        kind: String,
        field: &'static str,
    },

    /// A field is present but has the wrong shape
    #[error("Invalid field `{field}`: {message}")]
    InvalidField { field: &'static str, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}
