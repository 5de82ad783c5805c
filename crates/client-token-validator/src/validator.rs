//! The validator contract

use client_token_core::RequestContext;
use std::sync::Arc;

use crate::error::Result;

/// Decides whether the current request is authentic
///
/// A validator is bound at construction to one merchant, one secret key and
/// one request; it holds no other state.
pub trait Validator: Send + Sync {
    /// Whether the bound request carries a valid signature
    fn is_valid(&self) -> bool;

    /// Identifier of this implementation (for logging)
    fn name(&self) -> &str {
        "validator"
    }

    /// Why the request was rejected, if it was
    fn failure_reason(&self) -> Option<String> {
        None
    }
}

/// Inputs a validator is built from
#[derive(Debug, Clone)]
pub struct ValidatorArgs {
    /// Merchant the request claims to act for
    pub merchant: String,

    /// Secret key resolved for the merchant/device
    pub secret_key: String,

    /// The request being validated
    pub request: Arc<RequestContext>,
}

impl ValidatorArgs {
    pub fn new(
        merchant: impl Into<String>,
        secret_key: impl Into<String>,
        request: Arc<RequestContext>,
    ) -> Self {
        Self {
            merchant: merchant.into(),
            secret_key: secret_key.into(),
            request,
        }
    }
}

/// Builds validators of one kind
///
/// Construction must be deterministic for a given [`ValidatorArgs`]: either
/// it always succeeds or it always fails.
pub trait ValidatorFactory: Send + Sync {
    /// Configuration identifier of the validators this factory builds
    fn name(&self) -> &str;

    /// Build a validator bound to `args`
    fn create(&self, args: &ValidatorArgs) -> Result<Box<dyn Validator>>;

    /// Whether the validators accept requests without a cryptographic proof
    fn is_insecure(&self) -> bool {
        false
    }
}
