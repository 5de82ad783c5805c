//! # Client Token Core
//!
//! Data model and primitives shared by the client-token crates.
//!
//! ## Key Concepts
//!
//! - **Merchant**: the tenant that owns a [`TokenRecord`] and the devices registered under it
//! - **Device**: a client install, registered under a merchant as a [`ClientRecord`]
//! - **Static mode**: one fixed secret key per merchant, shared by all its devices
//! - **Dynamic mode**: every device registration issues a fresh, per-device secret key
//! - **Bundle**: the allow-listed extra attributes a device may store ([`BundleKeys`])

pub mod crypto;
pub mod error;
pub mod types;

pub use crypto::{generate_secret_key, is_well_formed_secret_key, SECRET_KEY_LEN};
pub use error::{CoreError, Result};
pub use types::{
    BundleKeys, ClientRecord, RequestContext, TokenMode, TokenRecord, TokenStatus,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
