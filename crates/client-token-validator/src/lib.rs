//! Client Token Validators
//!
//! A validator decides whether the current request is correctly signed for a
//! given merchant and secret key. The session never looks inside a
//! validator: it builds one for the resolved `(merchant, secret_key)` pair and
//! asks [`Validator::is_valid`].
//!
//! ## Architecture
//!
//! Validators are produced by factories kept in a [`ValidatorRegistry`],
//! keyed by a configuration identifier:
//!
//! - **hmac-sha256**: HMAC-SHA256 over a canonical request string
//! - **mock**: accepts when the presented signature is the secret key itself
//!
//! ## Usage
//!
//! ```ignore
//! use client_token_validator::{ValidatorArgs, ValidatorRegistry};
//!
//! let registry = ValidatorRegistry::with_defaults();
//! let validator = registry.create("hmac-sha256", &ValidatorArgs::new("acme", key, request))?;
//! if validator.is_valid() {
//!     // request is authentic
//! }
//! ```

pub mod error;
pub mod registry;
pub mod validator;
pub mod validators;

pub use error::{Result, ValidatorError};
pub use registry::{ValidatorRegistry, ValidatorRegistryBuilder};
pub use validator::{Validator, ValidatorArgs, ValidatorFactory};
