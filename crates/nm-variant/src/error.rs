//! Variant error types

use thiserror::Error;

/// Errors raised while validating or converting wire values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VariantError {
    /// The value does not carry the expected type signature
    #[error("type mismatch: expected '{expected}', got '{found}'")]
    TypeMismatch { expected: String, found: String },

    /// Malformed type signature
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Malformed object path
    #[error("invalid object path: {0}")]
    InvalidObjectPath(String),

    /// Integer does not fit the requested type
    #[error("value out of range for '{0}'")]
    OutOfRange(&'static str),
}

impl VariantError {
    /// Build a type mismatch from two signatures
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        VariantError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Result type for variant operations
pub type Result<T> = std::result::Result<T, VariantError>;
