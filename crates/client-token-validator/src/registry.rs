//! Validator Registry - maps configuration identifiers to validator factories

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, ValidatorError};
use crate::validator::{Validator, ValidatorArgs, ValidatorFactory};
use crate::validators::{HmacValidatorFactory, MockValidatorFactory};

/// Registry of validator factories
///
/// The configured validator identifier (e.g. `"hmac-sha256"`) is looked up
/// here and the matching factory builds a validator for each request.
#[derive(Clone)]
pub struct ValidatorRegistry {
    factories: HashMap<String, Arc<dyn ValidatorFactory>>,
}

impl ValidatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the built-in validators registered
    pub fn with_defaults() -> Self {
        ValidatorRegistryBuilder::new()
            .with_factory(HmacValidatorFactory::default())
            .with_factory(MockValidatorFactory)
            .build()
    }

    /// Register a factory under its own name, replacing any previous one
    pub fn register<F: ValidatorFactory + 'static>(&mut self, factory: F) {
        let name = factory.name().to_string();
        info!(validator = %name, "Registered validator factory");
        self.factories.insert(name, Arc::new(factory));
    }

    /// Check if a factory is registered under `name`
    pub fn has_factory(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Whether the factory under `name` builds insecure validators
    ///
    /// Unknown names are not insecure; they fail at construction instead.
    pub fn is_insecure(&self, name: &str) -> bool {
        self.factories
            .get(name)
            .map(|f| f.is_insecure())
            .unwrap_or(false)
    }

    /// List all registered identifiers
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a validator with the factory registered under `name`
    ///
    /// Fails when no such factory exists, when the merchant or secret key
    /// is empty, or when the factory itself refuses.
    pub fn create(&self, name: &str, args: &ValidatorArgs) -> Result<Box<dyn Validator>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            warn!(validator = %name, "No factory for validator");
            ValidatorError::UnknownValidator(name.to_string())
        })?;

        if args.merchant.is_empty() {
            return Err(ValidatorError::MissingCredentials("merchant is empty".into()));
        }
        if args.secret_key.is_empty() {
            return Err(ValidatorError::MissingCredentials("secret key is empty".into()));
        }

        debug!(validator = %name, merchant = %args.merchant, "Constructing validator");
        factory.create(args)
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("factories", &self.registered_names())
            .finish()
    }
}

/// Builder for creating a ValidatorRegistry with factories
pub struct ValidatorRegistryBuilder {
    registry: ValidatorRegistry,
}

impl ValidatorRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: ValidatorRegistry::new(),
        }
    }

    /// Add a validator factory
    pub fn with_factory<F: ValidatorFactory + 'static>(mut self, factory: F) -> Self {
        self.registry.register(factory);
        self
    }

    pub fn build(self) -> ValidatorRegistry {
        self.registry
    }
}

impl Default for ValidatorRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
