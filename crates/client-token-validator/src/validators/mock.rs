//! Mock Validator
//!
//! For testing and local development. The "signature" is the secret key
//! itself, sent in clear.

use std::sync::Arc;

use client_token_core::RequestContext;

use crate::error::Result;
use crate::validator::{Validator, ValidatorArgs, ValidatorFactory};

/// Mock validator
///
/// Either compares the request signature with the secret key verbatim, or
/// (when built with [`MockValidator::fixed`]) always gives the same answer.
pub struct MockValidator {
    secret_key: String,
    request: Option<Arc<RequestContext>>,
    fixed: Option<bool>,
}

impl MockValidator {
    /// Validator comparing the request signature with `args.secret_key`
    pub fn new(args: &ValidatorArgs) -> Self {
        Self {
            secret_key: args.secret_key.clone(),
            request: Some(args.request.clone()),
            fixed: None,
        }
    }

    /// Validator that always answers `valid`
    pub fn fixed(valid: bool) -> Self {
        Self {
            secret_key: String::new(),
            request: None,
            fixed: Some(valid),
        }
    }
}

impl Validator for MockValidator {
    fn is_valid(&self) -> bool {
        if let Some(valid) = self.fixed {
            return valid;
        }
        match self.request.as_ref().and_then(|r| r.signature.as_deref()) {
            Some(signature) => !self.secret_key.is_empty() && signature == self.secret_key,
            None => false,
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn failure_reason(&self) -> Option<String> {
        if self.is_valid() {
            None
        } else {
            Some("presented key does not match".into())
        }
    }
}

/// Factory for [`MockValidator`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MockValidatorFactory;

impl ValidatorFactory for MockValidatorFactory {
    fn name(&self) -> &str {
        "mock"
    }

    fn create(&self, args: &ValidatorArgs) -> Result<Box<dyn Validator>> {
        Ok(Box::new(MockValidator::new(args)))
    }

    /// The secret key travels in clear
    fn is_insecure(&self) -> bool {
        true
    }
}
