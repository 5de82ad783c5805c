//! Error types for validator construction

use thiserror::Error;

/// Result type for validator operations
pub type Result<T> = std::result::Result<T, ValidatorError>;

/// Errors that can occur while obtaining a validator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    /// No factory registered under this identifier
    #[error("Unknown validator: {0}")]
    UnknownValidator(String),

    /// Merchant or secret key was empty
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// The factory refused to build a validator
    #[error("Validator construction failed: {0}")]
    Construction(String),
}
