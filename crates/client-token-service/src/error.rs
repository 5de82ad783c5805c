//! Error types for the client session

use client_token_validator::ValidatorError;
use thiserror::Error;

use crate::storage::StorageError;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Why a validation or registration did not go through
///
/// None of these are fatal: [`ClientSession::validate`](crate::ClientSession::validate)
/// and [`ClientSession::registry`](crate::ClientSession::registry) fold them
/// into `false` / an empty key. The `try_` variants hand them to the caller.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// `registry` was called before a successful `validate`
    #[error("Session has no validated identity")]
    NotAuthenticated,

    /// No token record with status `normal` for the merchant
    #[error("Merchant not found or disabled: {0}")]
    MerchantNotFound(String),

    /// Dynamic-mode merchant, non-initial validation, and no registration for the device
    #[error("Device {device} is not registered under merchant {merchant}")]
    UnregisteredDevice { device: String, merchant: String },

    /// The resolved secret key is empty
    #[error("Resolved secret key is empty for merchant {0}")]
    EmptySecretKey(String),

    /// No validator could be obtained
    #[error("Validator unavailable: {0}")]
    Validator(#[from] ValidatorError),

    /// The validator rejected the request
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// The client store did not apply the upsert
    #[error("Client record for device {0} was not persisted")]
    PersistenceFailed(String),

    /// Store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
