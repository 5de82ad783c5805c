//! Error types for the client-token data model

use thiserror::Error;

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while parsing or building core records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Unknown token mode string
    #[error("Unknown token mode: {0}")]
    InvalidMode(String),

    /// Unknown token status string
    #[error("Unknown token status: {0}")]
    InvalidStatus(String),
}
