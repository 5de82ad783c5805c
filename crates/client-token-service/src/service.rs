//! Per-request session factory
//!
//! Holds what every session shares (stores, validator registry, bundle
//! allow-list) and builds one fresh [`ClientSession`] per request.

use client_token_core::RequestContext;
use client_token_validator::validators::{HmacValidatorFactory, MockValidatorFactory};
use client_token_validator::{ValidatorRegistry, ValidatorRegistryBuilder};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ClientTokenConfig, ConfigError};
use crate::session::{ClientSession, ValidatorSource};
use crate::storage::{ClientStore, TokenStore};

/// Shared state sessions are built from
#[derive(Debug, Clone)]
pub struct ClientTokenService {
    token_store: Arc<dyn TokenStore>,
    client_store: Arc<dyn ClientStore>,
    registry: Arc<ValidatorRegistry>,
    config: ClientTokenConfig,
}

impl ClientTokenService {
    /// Create a service with the built-in validators
    ///
    /// Fails if `config.validator` names no built-in validator.
    pub fn new(
        config: ClientTokenConfig,
        token_store: Arc<dyn TokenStore>,
        client_store: Arc<dyn ClientStore>,
    ) -> Result<Self, ConfigError> {
        let registry = ValidatorRegistryBuilder::new()
            .with_factory(HmacValidatorFactory::new(config.max_clock_skew_secs))
            .with_factory(MockValidatorFactory)
            .build();
        Self::with_registry(config, token_store, client_store, registry)
    }

    /// Create a service with a custom validator registry
    pub fn with_registry(
        config: ClientTokenConfig,
        token_store: Arc<dyn TokenStore>,
        client_store: Arc<dyn ClientStore>,
        registry: ValidatorRegistry,
    ) -> Result<Self, ConfigError> {
        if !registry.has_factory(&config.validator) {
            return Err(ConfigError::UnknownValidator(config.validator));
        }

        if registry.is_insecure(&config.validator) {
            warn!(
                validator = %config.validator,
                "Configured validator accepts unsigned requests; do not use it in production"
            );
        }

        info!(
            validator = %config.validator,
            bundles = ?config.bundles.iter().collect::<Vec<_>>(),
            "Client token service configured"
        );

        Ok(Self {
            token_store,
            client_store,
            registry: Arc::new(registry),
            config,
        })
    }

    /// A fresh session for one request
    pub fn session(&self, request: RequestContext) -> ClientSession {
        ClientSession::new(
            self.token_store.clone(),
            self.client_store.clone(),
            ValidatorSource::named(self.config.validator.clone(), self.registry.clone()),
            self.config.bundles.clone(),
            Arc::new(request),
        )
    }

    pub fn config(&self) -> &ClientTokenConfig {
        &self.config
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }
}
