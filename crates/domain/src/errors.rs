//! Error types raised by domain validation and the wire codec

use thiserror::Error;

/// Domain-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Configuration error in '{field}': {message}")]
    Config { field: &'static str, message: String },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DomainError {
    pub fn config(field: &'static str, message: impl Into<String>) -> Self {
        Self::Config { field, message: message.into() }
    }
}

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, DomainError>;
