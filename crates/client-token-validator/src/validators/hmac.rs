//! HMAC-SHA256 Request Validator
//!
//! Clients sign every request with their secret key. The signed string is
//!
//! ```text
//! METHOD \n PATH \n TIMESTAMP \n NONCE \n hex(sha256(BODY))
//! ```
//!
//! and the signature travels hex-encoded alongside the timestamp and nonce.
//! Requests signed too far from the server clock are rejected.

use chrono::Utc;
use client_token_core::RequestContext;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, ValidatorError};
use crate::validator::{Validator, ValidatorArgs, ValidatorFactory};

type HmacSha256 = Hmac<Sha256>;

/// Default tolerated distance between the signed timestamp and now
pub const DEFAULT_MAX_SKEW_SECS: i64 = 300;

/// Validates an HMAC-SHA256 request signature
pub struct HmacValidator {
    merchant: String,
    secret_key: String,
    request: Arc<RequestContext>,
    max_skew_secs: i64,
}

impl HmacValidator {
    pub fn new(args: &ValidatorArgs, max_skew_secs: i64) -> Self {
        Self {
            merchant: args.merchant.clone(),
            secret_key: args.secret_key.clone(),
            request: args.request.clone(),
            max_skew_secs,
        }
    }

    /// Compute the hex signature a client sends for a request
    pub fn sign(
        secret_key: &str,
        method: &str,
        path: &str,
        timestamp: i64,
        nonce: &str,
        body: &[u8],
    ) -> String {
        let mac = keyed_mac(secret_key, method, path, timestamp, nonce, body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn check(&self) -> std::result::Result<(), String> {
        let signature = self
            .request
            .signature
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or("missing signature")?;
        let timestamp = self.request.timestamp.ok_or("missing timestamp")?;

        let skew = Utc::now().timestamp().abs_diff(timestamp);
        let window = u64::try_from(self.max_skew_secs).unwrap_or(0);
        if skew > window {
            return Err(format!(
                "timestamp outside allowed window ({}s > {}s)",
                skew, self.max_skew_secs
            ));
        }

        let presented = hex::decode(signature).map_err(|_| "signature is not hex".to_string())?;
        let mac = keyed_mac(
            &self.secret_key,
            &self.request.method,
            &self.request.path,
            timestamp,
            self.request.nonce.as_deref().unwrap_or_default(),
            &self.request.body,
        );

        mac.verify_slice(&presented)
            .map_err(|_| format!("signature mismatch for merchant {}", self.merchant))
    }
}

impl Validator for HmacValidator {
    fn is_valid(&self) -> bool {
        match self.check() {
            Ok(()) => true,
            Err(reason) => {
                debug!(merchant = %self.merchant, reason = %reason, "HMAC signature rejected");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "hmac-sha256"
    }

    fn failure_reason(&self) -> Option<String> {
        self.check().err()
    }
}

fn keyed_mac(
    secret_key: &str,
    method: &str,
    path: &str,
    timestamp: i64,
    nonce: &str,
    body: &[u8],
) -> HmacSha256 {
    let body_hash = hex::encode(Sha256::digest(body));
    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}",
        method.to_uppercase(),
        path,
        timestamp,
        nonce,
        body_hash
    );

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    mac
}

/// Factory for [`HmacValidator`]
#[derive(Debug, Clone)]
pub struct HmacValidatorFactory {
    max_skew_secs: i64,
}

impl HmacValidatorFactory {
    pub fn new(max_skew_secs: i64) -> Self {
        Self { max_skew_secs }
    }
}

impl Default for HmacValidatorFactory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SKEW_SECS)
    }
}

impl ValidatorFactory for HmacValidatorFactory {
    fn name(&self) -> &str {
        "hmac-sha256"
    }

    fn create(&self, args: &ValidatorArgs) -> Result<Box<dyn Validator>> {
        if self.max_skew_secs < 0 {
            return Err(ValidatorError::Construction(format!(
                "negative clock skew window: {}",
                self.max_skew_secs
            )));
        }
        Ok(Box::new(HmacValidator::new(args, self.max_skew_secs)))
    }
}
