//! API module for the client token service

pub mod error;
pub mod handlers;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Create the API router
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// handlers read the client address from the connection.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/v1/client/register", post(handlers::register_client))
        .route("/v1/client/renew", post(handlers::renew_client))
        .route("/v1/client/verify", post(handlers::verify_client))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
