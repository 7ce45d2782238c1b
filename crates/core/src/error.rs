//! Error types shared by the core primitives

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by core primitives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Logging could not be initialized
    #[error("Logging error: {0}")]
    Logging(String),
}

impl CoreError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        CoreError::Validation(msg.into())
    }

    /// Create a new logging error
    pub fn logging<S: Into<String>>(msg: S) -> Self {
        CoreError::Logging(msg.into())
    }
}
