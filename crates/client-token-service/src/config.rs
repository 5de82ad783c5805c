//! Service configuration
//!
//! All settings come from environment variables:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `CLIENT_TOKEN_VALIDATOR` | `hmac-sha256` | validator identifier |
//! | `CLIENT_TOKEN_BUNDLES` | empty | comma separated bundle allow-list |
//! | `CLIENT_TOKEN_PORT` | `8080` | HTTP listen port |
//! | `CLIENT_TOKEN_MAX_SKEW_SECS` | `300` | tolerated signature clock skew |
//! | `CLIENT_TOKEN_MERCHANTS` | empty | seed merchants, `name:mode:key` comma separated |
//! | `DATABASE_URL` | unset | PostgreSQL connection string |

use client_token_core::{BundleKeys, TokenMode, TokenRecord};
use client_token_validator::validators::DEFAULT_MAX_SKEW_SECS;
use thiserror::Error;

pub const DEFAULT_VALIDATOR: &str = "hmac-sha256";
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },

    #[error("Unknown validator: {0}")]
    UnknownValidator(String),
}

/// Client token service configuration
#[derive(Debug, Clone)]
pub struct ClientTokenConfig {
    /// Identifier of the validator sessions build per request
    pub validator: String,
    /// Bundle attribute allow-list
    pub bundles: BundleKeys,
    pub port: u16,
    pub max_clock_skew_secs: i64,
    /// Merchants loaded into the in-memory store at startup
    pub seed_merchants: Vec<TokenRecord>,
    pub database_url: Option<String>,
}

impl Default for ClientTokenConfig {
    fn default() -> Self {
        Self {
            validator: DEFAULT_VALIDATOR.to_string(),
            bundles: BundleKeys::default(),
            port: DEFAULT_PORT,
            max_clock_skew_secs: DEFAULT_MAX_SKEW_SECS,
            seed_merchants: Vec::new(),
            database_url: None,
        }
    }
}

impl ClientTokenConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let validator = lookup("CLIENT_TOKEN_VALIDATOR")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.validator);

        let bundles = lookup("CLIENT_TOKEN_BUNDLES")
            .map(|v| BundleKeys::new(v.split(',')))
            .unwrap_or_default();

        let port = match lookup("CLIENT_TOKEN_PORT") {
            Some(v) => parse_var("CLIENT_TOKEN_PORT", &v)?,
            None => defaults.port,
        };

        let max_clock_skew_secs = match lookup("CLIENT_TOKEN_MAX_SKEW_SECS") {
            Some(v) => {
                let secs: i64 = parse_var("CLIENT_TOKEN_MAX_SKEW_SECS", &v)?;
                if secs < 0 {
                    return Err(invalid("CLIENT_TOKEN_MAX_SKEW_SECS", &v));
                }
                secs
            }
            None => defaults.max_clock_skew_secs,
        };

        let seed_merchants = match lookup("CLIENT_TOKEN_MERCHANTS") {
            Some(v) => parse_merchants(&v)?,
            None => Vec::new(),
        };

        let database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty());

        Ok(Self {
            validator,
            bundles,
            port,
            max_clock_skew_secs,
            seed_merchants,
            database_url,
        })
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(var, value))
}

fn invalid(var: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    }
}

/// Parse `name:mode:key` entries; the key may be omitted for dynamic merchants
fn parse_merchants(value: &str) -> Result<Vec<TokenRecord>, ConfigError> {
    let mut out = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut parts = entry.splitn(3, ':');
        let merchant = parts.next().unwrap_or_default().trim();
        let mode: TokenMode = parts
            .next()
            .unwrap_or_default()
            .parse()
            .map_err(|_| invalid("CLIENT_TOKEN_MERCHANTS", entry))?;
        let key = parts.next().unwrap_or_default().trim();

        if merchant.is_empty() || (mode == TokenMode::Static && key.is_empty()) {
            return Err(invalid("CLIENT_TOKEN_MERCHANTS", entry));
        }

        out.push(match mode {
            TokenMode::Static => TokenRecord::new_static(merchant, key),
            TokenMode::Dynamic => TokenRecord::new_dynamic(merchant, key),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| vars.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientTokenConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.validator, "hmac-sha256");
        assert!(config.bundles.is_empty());
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_clock_skew_secs, 300);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = ClientTokenConfig::from_lookup(lookup(&[
            ("CLIENT_TOKEN_VALIDATOR", "mock"),
            ("CLIENT_TOKEN_BUNDLES", "plan, region,,plan"),
            ("CLIENT_TOKEN_PORT", "9090"),
            ("CLIENT_TOKEN_MAX_SKEW_SECS", "60"),
            ("CLIENT_TOKEN_MERCHANTS", "acme:static:ABCD1234, dynco:dynamic"),
            ("DATABASE_URL", "postgres://localhost/client_token"),
        ]))
        .unwrap();

        assert_eq!(config.validator, "mock");
        assert_eq!(config.bundles.iter().collect::<Vec<_>>(), vec!["plan", "region"]);
        assert_eq!(config.port, 9090);
        assert_eq!(config.max_clock_skew_secs, 60);
        assert_eq!(config.seed_merchants.len(), 2);
        assert_eq!(config.seed_merchants[0].secret_key, "ABCD1234");
        assert!(config.seed_merchants[1].is_dynamic());
        assert!(config.database_url.is_some());
    }

    #[test]
    fn test_invalid_port() {
        let err = ClientTokenConfig::from_lookup(lookup(&[("CLIENT_TOKEN_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "CLIENT_TOKEN_PORT"));
    }

    #[test]
    fn test_negative_skew() {
        assert!(ClientTokenConfig::from_lookup(lookup(&[("CLIENT_TOKEN_MAX_SKEW_SECS", "-5")])).is_err());
    }

    #[test]
    fn test_invalid_merchants() {
        assert!(parse_merchants("acme:static").is_err());
        assert!(parse_merchants("acme:rotating:K").is_err());
        assert!(parse_merchants(":static:K").is_err());
        assert!(parse_merchants("").unwrap().is_empty());
    }
}
