//! Built-in validators

pub mod hmac;
pub mod mock;

pub use self::hmac::{HmacValidator, HmacValidatorFactory, DEFAULT_MAX_SKEW_SECS};
pub use self::mock::{MockValidator, MockValidatorFactory};
