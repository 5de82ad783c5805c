//! Core record types for merchant tokens and registered devices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::error::CoreError;

/// How a merchant's secret key is issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// One fixed secret key per merchant, shared by all devices
    Static,
    /// A fresh secret key per device, rotated on every registration
    Dynamic,
}

impl std::fmt::Display for TokenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenMode::Static => write!(f, "static"),
            TokenMode::Dynamic => write!(f, "dynamic"),
        }
    }
}

impl std::str::FromStr for TokenMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(TokenMode::Static),
            "dynamic" => Ok(TokenMode::Dynamic),
            _ => Err(CoreError::InvalidMode(s.to_string())),
        }
    }
}

/// Administrative status of a merchant token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    /// Eligible for validation
    Normal,
    /// Administratively switched off
    Disabled,
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenStatus::Normal => write!(f, "normal"),
            TokenStatus::Disabled => write!(f, "disabled"),
        }
    }
}

impl std::str::FromStr for TokenStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(TokenStatus::Normal),
            "disabled" => Ok(TokenStatus::Disabled),
            _ => Err(CoreError::InvalidStatus(s.to_string())),
        }
    }
}

/// A merchant's token configuration
///
/// Administered outside this crate; read-only from the session's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Unique merchant identifier
    pub merchant: String,

    /// Key issuance mode
    pub mode: TokenMode,

    /// Authoritative secret key (only meaningful in static mode)
    #[serde(default)]
    pub secret_key: String,

    /// Administrative status
    pub status: TokenStatus,
}

impl TokenRecord {
    /// Create a static-mode record with a fixed secret key
    pub fn new_static(merchant: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            merchant: merchant.into(),
            mode: TokenMode::Static,
            secret_key: secret_key.into(),
            status: TokenStatus::Normal,
        }
    }

    /// Create a dynamic-mode record
    ///
    /// `secret_key` is the bootstrap key presented by a device on its very
    /// first (initial) validation, before it has a key of its own.
    pub fn new_dynamic(merchant: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            merchant: merchant.into(),
            mode: TokenMode::Dynamic,
            secret_key: secret_key.into(),
            status: TokenStatus::Normal,
        }
    }

    /// Set the status
    pub fn with_status(mut self, status: TokenStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether this record may be used for validation
    pub fn is_normal(&self) -> bool {
        self.status == TokenStatus::Normal
    }

    pub fn is_dynamic(&self) -> bool {
        self.mode == TokenMode::Dynamic
    }
}

/// A device registered under a merchant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Unique device identifier (primary key)
    pub device: String,

    /// Owning merchant
    pub token_merchant: String,

    /// Current secret key for this device
    pub token_secret_key: String,

    /// Allow-listed bundle attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Last-seen request origin
    #[serde(default)]
    pub client_ip: String,

    /// Last registration or renewal
    pub renewal_time: DateTime<Utc>,
}

impl ClientRecord {
    /// Create a record renewed now, with no attributes and no client IP
    pub fn new(
        device: impl Into<String>,
        token_merchant: impl Into<String>,
        token_secret_key: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            token_merchant: token_merchant.into(),
            token_secret_key: token_secret_key.into(),
            attributes: BTreeMap::new(),
            client_ip: String::new(),
            renewal_time: Utc::now(),
        }
    }

    /// Replace the attribute bundle
    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Add a single attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the client IP
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = client_ip.into();
        self
    }

    /// Set the renewal time
    pub fn with_renewal_time(mut self, renewal_time: DateTime<Utc>) -> Self {
        self.renewal_time = renewal_time;
        self
    }
}

/// Fixed allow-list of bundle attribute names
///
/// Order of first appearance is kept; blank names and duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleKeys(Vec<String>);

impl BundleKeys {
    /// Build an allow-list from attribute names
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for key in keys {
            let key = key.into().trim().to_string();
            if !key.is_empty() && !out.contains(&key) {
                out.push(key);
            }
        }
        Self(out)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|k| k == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only the allowed pairs of `bundle`, silently dropping the rest
    pub fn filter<I, K, V>(&self, bundle: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        bundle
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| self.contains(k))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for BundleKeys {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// The request being authenticated
///
/// Carries what validators and registration read from the ambient request:
/// origin address plus the material a request signature is computed over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Request origin
    pub client_ip: Option<IpAddr>,

    /// HTTP method, upper case
    pub method: String,

    /// Request path
    pub path: String,

    /// Raw request body
    pub body: Vec<u8>,

    /// Signature presented by the client
    pub signature: Option<String>,

    /// Unix timestamp (seconds) the client signed at
    pub timestamp: Option<i64>,

    /// Client-chosen nonce
    pub nonce: Option<String>,
}

impl RequestContext {
    /// Create a context for a method and path
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_client_ip(mut self, client_ip: IpAddr) -> Self {
        self.client_ip = Some(client_ip);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Client IP as stored on a [`ClientRecord`], empty when unknown
    pub fn client_ip_string(&self) -> String {
        self.client_ip.map(|ip| ip.to_string()).unwrap_or_default()
    }
}
