//! Client Session
//!
//! One session serves one validation/registration flow:
//!
//! 1. `validate(merchant, device, initial)` resolves the merchant's secret key
//!    (static: the merchant key; dynamic: the device's current key, or the
//!    merchant's bootstrap key when `initial`), obtains a validator bound to
//!    it and records the identity when the request checks out.
//! 2. `registry(bundle)` upserts the device record for the validated
//!    identity and returns its secret key, freshly generated for dynamic
//!    merchants.
//! 3. `attribute(name)` reads allow-listed bundle attributes of the device,
//!    loaded once per session.

use chrono::Utc;
use client_token_core::{generate_secret_key, BundleKeys, ClientRecord, RequestContext, TokenRecord};
use client_token_validator::{Validator, ValidatorArgs, ValidatorRegistry};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::storage::{ClientStore, TokenStore};

/// Where the session gets its validator from
#[derive(Clone)]
pub enum ValidatorSource {
    /// A validator supplied ready-made; reused for every validation
    Bound(Arc<dyn Validator>),
    /// A registry identifier; a validator is built per validation
    Named {
        name: String,
        registry: Arc<ValidatorRegistry>,
    },
}

impl ValidatorSource {
    pub fn named(name: impl Into<String>, registry: Arc<ValidatorRegistry>) -> Self {
        ValidatorSource::Named {
            name: name.into(),
            registry,
        }
    }
}

impl std::fmt::Debug for ValidatorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidatorSource::Bound(v) => f.debug_tuple("Bound").field(&v.name()).finish(),
            ValidatorSource::Named { name, .. } => {
                f.debug_struct("Named").field("name", name).finish()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttributeCache {
    Unloaded,
    /// The device had no record when first read
    Missing,
    Loaded(BTreeMap<String, String>),
}

/// Authenticated-session facade over validation, registration and attributes
pub struct ClientSession {
    token_store: Arc<dyn TokenStore>,
    client_store: Arc<dyn ClientStore>,
    source: ValidatorSource,
    validator: Option<Arc<dyn Validator>>,
    bundles: BundleKeys,
    request: Arc<RequestContext>,
    device: String,
    merchant: String,
    attributes: AttributeCache,
}

impl ClientSession {
    pub fn new(
        token_store: Arc<dyn TokenStore>,
        client_store: Arc<dyn ClientStore>,
        source: ValidatorSource,
        bundles: BundleKeys,
        request: Arc<RequestContext>,
    ) -> Self {
        let validator = match &source {
            ValidatorSource::Bound(v) => Some(v.clone()),
            ValidatorSource::Named { .. } => None,
        };
        Self {
            token_store,
            client_store,
            source,
            validator,
            bundles,
            request,
            device: String::new(),
            merchant: String::new(),
            attributes: AttributeCache::Unloaded,
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate the current request for `merchant`/`device`
    ///
    /// Returns `true` and records the identity on success. Every failure
    /// (unknown or disabled merchant, unregistered device, no validator,
    /// bad signature, store error) yields `false` and leaves the identity
    /// untouched.
    pub async fn validate(&mut self, merchant: &str, device: &str, initial: bool) -> bool {
        match self.try_validate(merchant, device, initial).await {
            Ok(()) => true,
            Err(e) => {
                warn!(merchant = %merchant, device = %device, initial, error = %e, "Client validation failed");
                false
            }
        }
    }

    /// [`validate`](Self::validate), reporting why it failed
    pub async fn try_validate(&mut self, merchant: &str, device: &str, initial: bool) -> Result<()> {
        let token = self.find_token(merchant).await?;

        let secret_key = if token.is_dynamic() && !initial {
            match self.client_store.find_by_device_and_merchant(device, merchant).await? {
                Some(record) => record.token_secret_key,
                None => {
                    return Err(SessionError::UnregisteredDevice {
                        device: device.to_string(),
                        merchant: merchant.to_string(),
                    })
                }
            }
        } else {
            token.secret_key
        };

        if secret_key.is_empty() {
            return Err(SessionError::EmptySecretKey(merchant.to_string()));
        }

        let validator = self.obtain_validator(merchant, &secret_key)?;
        if !validator.is_valid() {
            let reason = validator
                .failure_reason()
                .unwrap_or_else(|| format!("rejected by {}", validator.name()));
            return Err(SessionError::InvalidSignature(reason));
        }

        self.merchant = merchant.to_string();
        self.device = device.to_string();
        info!(
            merchant = %merchant,
            device = %device,
            mode = %token.mode,
            validator = validator.name(),
            "Client validated"
        );
        Ok(())
    }

    fn obtain_validator(&mut self, merchant: &str, secret_key: &str) -> Result<Arc<dyn Validator>> {
        match &self.source {
            ValidatorSource::Bound(v) => Ok(v.clone()),
            ValidatorSource::Named { name, registry } => {
                let args = ValidatorArgs::new(merchant, secret_key, self.request.clone());
                match registry.create(name, &args) {
                    Ok(v) => {
                        let v: Arc<dyn Validator> = Arc::from(v);
                        self.validator = Some(v.clone());
                        Ok(v)
                    }
                    Err(e) => {
                        self.validator = None;
                        Err(e.into())
                    }
                }
            }
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register the validated device and return its secret key
    ///
    /// Only allow-listed bundle entries are stored. Dynamic merchants get a
    /// freshly generated key, static merchants their fixed key. Returns an
    /// empty string when the session is not validated, the merchant has
    /// disappeared, or the store did not persist the record.
    pub async fn registry<I, K, V>(&mut self, bundle: I) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        match self.try_registry(bundle).await {
            Ok(key) => key,
            Err(e) => {
                warn!(merchant = %self.merchant, device = %self.device, error = %e, "Client registration failed");
                String::new()
            }
        }
    }

    /// [`registry`](Self::registry), reporting why it failed
    pub async fn try_registry<I, K, V>(&mut self, bundle: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        let merchant = self.merchant.clone();
        let token = self.find_token(&merchant).await?;

        let accepted = self.bundles.filter(bundle);
        if !accepted.is_empty() {
            match &mut self.attributes {
                AttributeCache::Loaded(cache) => {
                    cache.extend(accepted.iter().map(|(k, v)| (k.clone(), v.clone())))
                }
                other => *other = AttributeCache::Loaded(accepted.clone()),
            }
        }

        let secret_key = if token.is_dynamic() {
            generate_secret_key()
        } else {
            token.secret_key
        };

        let record = ClientRecord::new(&self.device, &merchant, &secret_key)
            .with_attributes(accepted)
            .with_client_ip(self.request.client_ip_string())
            .with_renewal_time(Utc::now());

        if !self.client_store.upsert_by_device(record).await? {
            return Err(SessionError::PersistenceFailed(self.device.clone()));
        }

        info!(merchant = %merchant, device = %self.device, mode = %token.mode, "Client registered");
        Ok(secret_key)
    }

    // =========================================================================
    // Bundle attributes
    // =========================================================================

    /// Value of the allow-listed bundle attribute `name`
    ///
    /// The device record is read at most once per session, on the first
    /// access; later changes to the record are not seen. Names outside the
    /// allow-list, and every name when the device has no record, give `None`.
    pub async fn attribute(&mut self, name: &str) -> Option<String> {
        if !self.bundles.contains(name) {
            return None;
        }

        if self.attributes == AttributeCache::Unloaded {
            if !self.is_authenticated() {
                return None;
            }
            self.attributes = match self
                .client_store
                .find_by_device_and_merchant(&self.device, &self.merchant)
                .await
            {
                Ok(Some(record)) => {
                    let loaded = self
                        .bundles
                        .iter()
                        .map(|key| {
                            let value = record.attributes.get(key).cloned().unwrap_or_default();
                            (key.to_string(), value)
                        })
                        .collect();
                    AttributeCache::Loaded(loaded)
                }
                Ok(None) => AttributeCache::Missing,
                Err(e) => {
                    warn!(device = %self.device, error = %e, "Failed to load client attributes");
                    return None;
                }
            };
            debug!(device = %self.device, "Loaded client attributes");
        }

        match &self.attributes {
            AttributeCache::Loaded(cache) => cache.get(name).cloned(),
            AttributeCache::Unloaded | AttributeCache::Missing => None,
        }
    }

    /// Whether `name` is allow-listed and has a non-empty value
    pub async fn has_attribute(&mut self, name: &str) -> bool {
        self.attribute(name)
            .await
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    /// Every allow-listed attribute with its value
    pub async fn attributes(&mut self) -> HashMap<String, Option<String>> {
        let names: Vec<String> = self.bundles.iter().map(str::to_string).collect();
        let mut out = HashMap::with_capacity(names.len());
        for name in names {
            let value = self.attribute(&name).await;
            out.insert(name, value);
        }
        out
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Validated device, empty until `validate` succeeds
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Validated merchant, empty until `validate` succeeds
    pub fn merchant(&self) -> &str {
        &self.merchant
    }

    pub fn is_authenticated(&self) -> bool {
        !self.merchant.is_empty()
    }

    pub fn bundle_keys(&self) -> &BundleKeys {
        &self.bundles
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    // =========================================================================
    // Validator pass-through
    // =========================================================================

    /// The active validator, if any
    pub fn validator(&self) -> Option<&dyn Validator> {
        self.validator.as_deref()
    }

    pub fn validator_name(&self) -> Option<&str> {
        self.validator.as_deref().map(|v| v.name())
    }

    pub fn validator_is_valid(&self) -> Option<bool> {
        self.validator.as_deref().map(|v| v.is_valid())
    }

    pub fn validator_failure_reason(&self) -> Option<String> {
        self.validator.as_deref().and_then(|v| v.failure_reason())
    }

    /// Run `f` against the active validator
    pub fn with_validator<R>(&self, f: impl FnOnce(&dyn Validator) -> R) -> Option<R> {
        self.validator.as_deref().map(|v| f(v))
    }

    async fn find_token(&self, merchant: &str) -> Result<TokenRecord> {
        self.token_store
            .find_by_merchant(merchant)
            .await?
            .ok_or_else(|| SessionError::MerchantNotFound(merchant.to_string()))
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("source", &self.source)
            .field("merchant", &self.merchant)
            .field("device", &self.device)
            .field("bundles", &self.bundles)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StorageError};
    use async_trait::async_trait;
    use client_token_core::{is_well_formed_secret_key, TokenStatus};
    use client_token_validator::validators::MockValidator;

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.put_token(TokenRecord::new_static("acme", "ABCD1234")).unwrap();
        store.put_token(TokenRecord::new_dynamic("dynco", "BOOTSTRAP")).unwrap();
        store
    }

    fn request(signature: &str) -> Arc<RequestContext> {
        Arc::new(
            RequestContext::new("POST", "/v1/client/register")
                .with_client_ip("192.0.2.10".parse().unwrap())
                .with_signature(signature),
        )
    }

    fn named_session(store: &Arc<MemoryStore>, signature: &str, bundles: &[&str]) -> ClientSession {
        ClientSession::new(
            store.clone(),
            store.clone(),
            ValidatorSource::named("mock", Arc::new(ValidatorRegistry::with_defaults())),
            BundleKeys::new(bundles.iter().copied()),
            request(signature),
        )
    }

    fn bound_session(store: &Arc<MemoryStore>, valid: bool, bundles: &[&str]) -> ClientSession {
        ClientSession::new(
            store.clone(),
            store.clone(),
            ValidatorSource::Bound(Arc::new(MockValidator::fixed(valid))),
            BundleKeys::new(bundles.iter().copied()),
            request(""),
        )
    }

    #[tokio::test]
    async fn test_static_validate_and_registry() {
        let store = store();
        let mut session = named_session(&store, "ABCD1234", &["plan"]);

        assert!(session.validate("acme", "dev1", false).await);
        assert_eq!(session.merchant(), "acme");
        assert_eq!(session.device(), "dev1");

        let key = session.registry([("plan", "pro"), ("debug", "1")]).await;
        assert_eq!(key, "ABCD1234");

        let record = store.client("dev1").unwrap().unwrap();
        assert_eq!(record.token_merchant, "acme");
        assert_eq!(record.token_secret_key, "ABCD1234");
        assert_eq!(record.client_ip, "192.0.2.10");
        assert_eq!(record.attributes.len(), 1);
        assert_eq!(record.attributes["plan"], "pro");
    }

    #[tokio::test]
    async fn test_unknown_merchant() {
        let store = store();
        let mut session = named_session(&store, "ABCD1234", &[]);

        let err = session.try_validate("initech", "dev1", false).await.unwrap_err();
        assert!(matches!(err, SessionError::MerchantNotFound(_)));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_disabled_merchant_always_fails() {
        let store = store();
        store.set_token_status("acme", TokenStatus::Disabled).unwrap();

        let mut session = bound_session(&store, true, &[]);
        assert!(!session.validate("acme", "dev1", false).await);
        assert!(!session.validate("acme", "dev1", true).await);
        assert_eq!(session.merchant(), "");
    }

    #[tokio::test]
    async fn test_static_initial_uses_same_key() {
        let store = store();
        let mut session = named_session(&store, "ABCD1234", &[]);
        assert!(session.validate("acme", "dev1", true).await);

        let mut session = named_session(&store, "ABCD1234", &[]);
        assert!(session.validate("acme", "dev1", false).await);
    }

    #[tokio::test]
    async fn test_dynamic_without_record_fails() {
        let store = store();

        let mut session = bound_session(&store, true, &[]);
        let err = session.try_validate("dynco", "dev9", false).await.unwrap_err();
        assert!(matches!(err, SessionError::UnregisteredDevice { .. }));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_dynamic_flow_rotates_key() {
        let store = store();

        let mut session = named_session(&store, "BOOTSTRAP", &[]);
        assert!(session.validate("dynco", "dev1", true).await);
        let first = session.registry(Vec::<(String, String)>::new()).await;
        assert!(is_well_formed_secret_key(&first));
        assert_eq!(store.client("dev1").unwrap().unwrap().token_secret_key, first);

        // the bootstrap key no longer works for non-initial requests
        let mut session = named_session(&store, "BOOTSTRAP", &[]);
        assert!(!session.validate("dynco", "dev1", false).await);

        let mut session = named_session(&store, &first, &[]);
        assert!(session.validate("dynco", "dev1", false).await);
        let second = session.registry(Vec::<(String, String)>::new()).await;
        assert!(is_well_formed_secret_key(&second));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_bad_signature() {
        let store = store();
        let mut session = named_session(&store, "WRONG", &[]);

        let err = session.try_validate("acme", "dev1", false).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidSignature(_)));
        assert_eq!(session.validator_name(), Some("mock"));
        assert_eq!(session.validator_is_valid(), Some(false));
    }

    #[tokio::test]
    async fn test_unknown_named_validator() {
        let store = store();
        let mut session = ClientSession::new(
            store.clone(),
            store.clone(),
            ValidatorSource::named("rsa", Arc::new(ValidatorRegistry::with_defaults())),
            BundleKeys::default(),
            request("ABCD1234"),
        );

        let err = session.try_validate("acme", "dev1", false).await.unwrap_err();
        assert!(matches!(err, SessionError::Validator(_)));
        assert!(session.validator().is_none());
    }

    #[tokio::test]
    async fn test_registry_requires_validation() {
        let store = store();
        let mut session = bound_session(&store, true, &["plan"]);

        assert!(matches!(
            session.try_registry([("plan", "pro")]).await,
            Err(SessionError::NotAuthenticated)
        ));
        assert_eq!(session.registry([("plan", "pro")]).await, "");
        assert_eq!(store.client_count(), 0);
    }

    #[tokio::test]
    async fn test_registry_after_merchant_disabled() {
        let store = store();
        let mut session = bound_session(&store, true, &[]);
        assert!(session.validate("acme", "dev1", false).await);

        store.set_token_status("acme", TokenStatus::Disabled).unwrap();
        assert_eq!(session.registry(Vec::<(String, String)>::new()).await, "");
    }

    #[tokio::test]
    async fn test_attribute_outside_allow_list() {
        let store = store();
        let mut session = bound_session(&store, true, &["plan"]);
        assert!(session.validate("acme", "dev1", false).await);
        session.registry([("plan", "pro"), ("secret", "x")]).await;

        assert_eq!(session.attribute("plan").await.as_deref(), Some("pro"));
        assert_eq!(session.attribute("secret").await, None);
        assert!(!session.has_attribute("secret").await);
    }

    #[tokio::test]
    async fn test_attribute_cache_is_loaded_once() {
        let store = store();
        store
            .put_client(ClientRecord::new("dev1", "acme", "ABCD1234").with_attribute("plan", "free"))
            .unwrap();

        let mut session = bound_session(&store, true, &["plan", "region"]);
        assert!(session.validate("acme", "dev1", false).await);

        assert_eq!(session.attribute("plan").await.as_deref(), Some("free"));
        assert_eq!(session.attribute("region").await.as_deref(), Some(""));
        assert!(!session.has_attribute("region").await);

        store
            .put_client(ClientRecord::new("dev1", "acme", "ABCD1234").with_attribute("plan", "pro"))
            .unwrap();
        assert_eq!(session.attribute("plan").await.as_deref(), Some("free"));
    }

    #[tokio::test]
    async fn test_attribute_without_record() {
        let store = store();
        let mut session = bound_session(&store, true, &["plan"]);
        assert!(session.validate("acme", "dev1", false).await);

        assert_eq!(session.attribute("plan").await, None);

        // a record appearing later is not picked up
        store
            .put_client(ClientRecord::new("dev1", "acme", "ABCD1234").with_attribute("plan", "pro"))
            .unwrap();
        assert_eq!(session.attribute("plan").await, None);
    }

    #[tokio::test]
    async fn test_attribute_before_validation() {
        let store = store();
        let mut session = bound_session(&store, true, &["plan"]);
        assert_eq!(session.attribute("plan").await, None);
    }

    #[tokio::test]
    async fn test_bound_validator_pass_through() {
        let store = store();
        let session = bound_session(&store, true, &[]);

        assert_eq!(session.validator_name(), Some("mock"));
        assert_eq!(session.with_validator(|v| v.is_valid()), Some(true));
        assert!(session.validator_failure_reason().is_none());
    }

    #[tokio::test]
    async fn test_named_validator_pass_through_empty_before_validate() {
        let store = store();
        let session = named_session(&store, "ABCD1234", &[]);

        assert!(session.validator().is_none());
        assert_eq!(session.with_validator(|v| v.name().to_string()), None);
    }

    #[derive(Debug)]
    struct RejectingClientStore;

    #[async_trait]
    impl ClientStore for RejectingClientStore {
        async fn find_by_device_and_merchant(
            &self,
            _device: &str,
            _merchant: &str,
        ) -> std::result::Result<Option<ClientRecord>, StorageError> {
            Ok(None)
        }

        async fn upsert_by_device(&self, _record: ClientRecord) -> std::result::Result<bool, StorageError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_yields_empty_key() {
        let tokens = store();
        let mut session = ClientSession::new(
            tokens.clone(),
            Arc::new(RejectingClientStore),
            ValidatorSource::Bound(Arc::new(MockValidator::fixed(true))),
            BundleKeys::new(["plan"]),
            request(""),
        );

        assert!(session.validate("acme", "dev1", false).await);
        assert!(matches!(
            session.try_registry([("plan", "pro")]).await,
            Err(SessionError::PersistenceFailed(_))
        ));
        assert_eq!(session.registry([("plan", "pro")]).await, "");
    }
}
