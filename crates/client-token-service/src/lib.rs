//! Client Token Service
//!
//! Issues, rotates and validates per-device secret keys for merchants.
//!
//! - [`ClientSession`]: one validation/registration flow (validate, registry,
//!   lazy bundle attributes, validator pass-through)
//! - [`ClientTokenService`]: shared stores and validator registry, one session per request
//! - [`storage`]: token and client stores, in-memory and PostgreSQL
//! - [`api`]: HTTP endpoints
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `POST /v1/client/register` - Validate with the merchant key and register the device
//! - `POST /v1/client/verify` - Validate with the device key and return its attributes

pub mod api;
pub mod config;
pub mod error;
pub mod service;
pub mod session;
pub mod storage;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{ClientTokenConfig, ConfigError};
pub use error::{Result, SessionError};
pub use service::ClientTokenService;
pub use session::{ClientSession, ValidatorSource};
pub use storage::{ClientStore, MemoryStore, StorageError, TokenStore};
