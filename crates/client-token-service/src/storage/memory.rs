//! In-memory storage backend
//!
//! Default storage implementation using in-memory hashmaps.
//! Suitable for development, tests and single-instance deployments.
//! Data is lost on restart.

use async_trait::async_trait;
use client_token_core::{ClientRecord, TokenRecord, TokenStatus};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

use super::{ClientStore, StorageError, TokenStore};

/// In-memory token and client store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tokens: RwLock<HashMap<String, TokenRecord>>,
    clients: RwLock<HashMap<String, ClientRecord>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a merchant's token record
    pub fn put_token(&self, record: TokenRecord) -> Result<(), StorageError> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        info!(merchant = %record.merchant, mode = %record.mode, status = %record.status, "Storing token record");
        tokens.insert(record.merchant.clone(), record);
        Ok(())
    }

    /// Change a merchant's status; returns false if the merchant is unknown
    pub fn set_token_status(&self, merchant: &str, status: TokenStatus) -> Result<bool, StorageError> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        match tokens.get_mut(merchant) {
            Some(record) => {
                record.status = status;
                info!(merchant = %merchant, status = %status, "Updated token status");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Insert or replace a client record directly
    pub fn put_client(&self, record: ClientRecord) -> Result<(), StorageError> {
        let mut clients = self.clients.write().map_err(poisoned)?;
        clients.insert(record.device.clone(), record);
        Ok(())
    }

    /// Current record for `device`, regardless of merchant
    pub fn client(&self, device: &str) -> Result<Option<ClientRecord>, StorageError> {
        let clients = self.clients.read().map_err(poisoned)?;
        Ok(clients.get(device).cloned())
    }

    /// Number of registered devices
    pub fn client_count(&self) -> usize {
        self.clients.read().map(|c| c.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Database("in-memory store lock poisoned".into())
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn find_by_merchant(&self, merchant: &str) -> Result<Option<TokenRecord>, StorageError> {
        let tokens = self.tokens.read().map_err(poisoned)?;
        let record = tokens.get(merchant).filter(|r| r.is_normal()).cloned();
        debug!(merchant = %merchant, found = record.is_some(), "Token lookup");
        Ok(record)
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn find_by_device_and_merchant(
        &self,
        device: &str,
        merchant: &str,
    ) -> Result<Option<ClientRecord>, StorageError> {
        let clients = self.clients.read().map_err(poisoned)?;
        Ok(clients
            .get(device)
            .filter(|r| r.token_merchant == merchant)
            .cloned())
    }

    async fn upsert_by_device(&self, record: ClientRecord) -> Result<bool, StorageError> {
        let mut clients = self.clients.write().map_err(poisoned)?;
        info!(device = %record.device, merchant = %record.token_merchant, "Upserting client record");
        match clients.get_mut(&record.device) {
            Some(existing) => {
                let ClientRecord {
                    token_merchant,
                    token_secret_key,
                    attributes,
                    client_ip,
                    renewal_time,
                    ..
                } = record;
                existing.token_merchant = token_merchant;
                existing.token_secret_key = token_secret_key;
                existing.attributes.extend(attributes);
                existing.client_ip = client_ip;
                existing.renewal_time = renewal_time;
            }
            None => {
                clients.insert(record.device.clone(), record);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_lookup_filters_disabled() {
        let store = MemoryStore::new();
        store.put_token(TokenRecord::new_static("acme", "ABCD1234")).unwrap();
        store
            .put_token(TokenRecord::new_static("globex", "K").with_status(TokenStatus::Disabled))
            .unwrap();

        assert!(store.find_by_merchant("acme").await.unwrap().is_some());
        assert!(store.find_by_merchant("globex").await.unwrap().is_none());
        assert!(store.find_by_merchant("initech").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_token_status() {
        let store = MemoryStore::new();
        store.put_token(TokenRecord::new_static("acme", "ABCD1234")).unwrap();

        assert!(store.set_token_status("acme", TokenStatus::Disabled).unwrap());
        assert!(store.find_by_merchant("acme").await.unwrap().is_none());
        assert!(!store.set_token_status("nobody", TokenStatus::Normal).unwrap());
    }

    #[tokio::test]
    async fn test_client_lookup_scoped_to_merchant() {
        let store = MemoryStore::new();
        store.put_client(ClientRecord::new("dev1", "acme", "KEY")).unwrap();

        assert!(store.find_by_device_and_merchant("dev1", "acme").await.unwrap().is_some());
        assert!(store.find_by_device_and_merchant("dev1", "globex").await.unwrap().is_none());
        assert!(store.find_by_device_and_merchant("dev2", "acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_device() {
        let store = MemoryStore::new();

        assert!(store.upsert_by_device(ClientRecord::new("dev1", "acme", "OLD")).await.unwrap());
        assert!(store.upsert_by_device(ClientRecord::new("dev1", "acme", "NEW")).await.unwrap());

        assert_eq!(store.client_count(), 1);
        assert_eq!(store.client("dev1").unwrap().unwrap().token_secret_key, "NEW");
    }

    #[tokio::test]
    async fn test_upsert_merges_attributes() {
        let store = MemoryStore::new();
        store
            .upsert_by_device(
                ClientRecord::new("dev1", "acme", "K1")
                    .with_attribute("plan", "free")
                    .with_attribute("region", "eu"),
            )
            .await
            .unwrap();
        store
            .upsert_by_device(ClientRecord::new("dev1", "acme", "K2").with_attribute("plan", "pro"))
            .await
            .unwrap();

        let record = store.client("dev1").unwrap().unwrap();
        assert_eq!(record.attributes["plan"], "pro");
        assert_eq!(record.attributes["region"], "eu");
        assert_eq!(record.token_secret_key, "K2");
    }
}
