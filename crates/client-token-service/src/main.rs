//! Client Token Server Binary
//!
//! Runs the HTTP service for device registration and verification.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use client_token_service::{
    create_router, AppState, ClientStore, ClientTokenConfig, ClientTokenService, MemoryStore,
    TokenStore,
};

#[tokio::main]
async fn main() {
    // Initialize logging
    let log_level = env::var("CLIENT_TOKEN_LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let config = ClientTokenConfig::from_env().expect("Invalid configuration");
    let port = config.port;

    let (token_store, client_store) = open_stores(&config).await;

    let service = ClientTokenService::new(config, token_store, client_store)
        .expect("Invalid validator configuration");

    info!(
        validator = %service.config().validator,
        port = port,
        "Starting client token server"
    );

    let state = Arc::new(AppState { service });
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "Client token server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("Server error");
}

#[cfg(feature = "postgres")]
async fn open_stores(config: &ClientTokenConfig) -> (Arc<dyn TokenStore>, Arc<dyn ClientStore>) {
    if let Some(url) = &config.database_url {
        let store = Arc::new(
            client_token_service::storage::PostgresStore::new(url)
                .await
                .expect("Failed to connect to PostgreSQL"),
        );
        if !config.seed_merchants.is_empty() {
            tracing::warn!("CLIENT_TOKEN_MERCHANTS is ignored with a database backend");
        }
        return (store.clone(), store);
    }
    memory_stores(config)
}

#[cfg(not(feature = "postgres"))]
async fn open_stores(config: &ClientTokenConfig) -> (Arc<dyn TokenStore>, Arc<dyn ClientStore>) {
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but the server was built without the postgres feature");
    }
    memory_stores(config)
}

fn memory_stores(config: &ClientTokenConfig) -> (Arc<dyn TokenStore>, Arc<dyn ClientStore>) {
    let store = Arc::new(MemoryStore::new());
    for record in &config.seed_merchants {
        store
            .put_token(record.clone())
            .expect("Failed to seed merchant");
    }
    info!(merchants = config.seed_merchants.len(), "Using in-memory store");
    (store.clone(), store)
}
