//! Storage abstraction for merchant tokens and registered devices
//!
//! Two repositories back the client session:
//! - the token store: merchant → mode, secret key, status (read-only here)
//! - the client store: device → merchant, current secret key, bundle attributes
//!
//! Both have an in-memory backend (default) and a PostgreSQL backend behind
//! the `postgres` feature.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use client_token_core::{ClientRecord, TokenRecord};
use std::fmt::Debug;

/// Error type for storage operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Merchant token lookups
#[async_trait]
pub trait TokenStore: Send + Sync + Debug {
    /// Find the token record for `merchant`
    ///
    /// Only records with status `normal` are returned; disabled merchants
    /// look exactly like unknown ones.
    async fn find_by_merchant(&self, merchant: &str) -> Result<Option<TokenRecord>, StorageError>;
}

/// Registered device lookups and upserts
#[async_trait]
pub trait ClientStore: Send + Sync + Debug {
    /// Find the record of `device` registered under `merchant`
    async fn find_by_device_and_merchant(
        &self,
        device: &str,
        merchant: &str,
    ) -> Result<Option<ClientRecord>, StorageError>;

    /// Insert or update the record keyed by `record.device`
    ///
    /// Scalar fields are overwritten. Bundle attributes are merged: keys in
    /// `record.attributes` replace stored values, stored keys absent from it
    /// are kept. Returns whether the write was applied.
    async fn upsert_by_device(&self, record: ClientRecord) -> Result<bool, StorageError>;
}
