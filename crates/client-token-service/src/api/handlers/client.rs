//! Client registration and verification handlers
//!
//! Both endpoints authenticate the raw request with the configured
//! validator. Signature material travels in headers:
//!
//! - `X-Signature`: the client's signature
//! - `X-Timestamp`: unix seconds the client signed at
//! - `X-Nonce`: client-chosen nonce

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, Uri},
    Json,
};
use client_token_core::RequestContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiError;
use crate::service::ClientTokenService;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const NONCE_HEADER: &str = "x-nonce";

/// Application state shared across handlers
pub struct AppState {
    pub service: ClientTokenService,
}

/// Request to register a device
#[derive(Debug, Deserialize)]
pub struct RegisterClientRequest {
    pub merchant: String,
    pub device: String,

    /// Bundle attributes; keys outside the allow-list are ignored
    #[serde(default)]
    pub bundle: HashMap<String, String>,
}

/// Response from device registration
#[derive(Debug, Serialize)]
pub struct RegisterClientResponse {
    pub merchant: String,
    pub device: String,

    /// Key the device signs subsequent requests with
    pub secret_key: String,
}

/// Request to verify a registered device
#[derive(Debug, Deserialize)]
pub struct VerifyClientRequest {
    pub merchant: String,
    pub device: String,
}

/// Response from device verification
#[derive(Debug, Serialize)]
pub struct VerifyClientResponse {
    pub valid: bool,
    pub merchant: String,
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    pub attributes: HashMap<String, Option<String>>,
}

/// Register a device
///
/// POST /v1/client/register
///
/// The request is validated as an initial one: it is signed with the
/// merchant key (the bootstrap key for dynamic merchants). The device record
/// is then upserted and its secret key returned. For a dynamic merchant this
/// issues a new key even when the device is already registered, so whoever
/// holds the bootstrap key can rotate any device of that merchant; devices
/// that already have a key should use [`renew_client`].
pub async fn register_client(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RegisterClientResponse>, ApiError> {
    let context = request_context(addr, &method, &uri, &headers, &body);
    issue_key(&state, context, &body, true).await
}

/// Renew a registered device's key and bundle
///
/// POST /v1/client/renew
///
/// Same body as registration, but the request must be signed with the
/// device's current key. Unregistered devices are refused.
pub async fn renew_client(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RegisterClientResponse>, ApiError> {
    let context = request_context(addr, &method, &uri, &headers, &body);
    issue_key(&state, context, &body, false).await
}

async fn issue_key(
    state: &AppState,
    context: RequestContext,
    body: &[u8],
    initial: bool,
) -> Result<Json<RegisterClientResponse>, ApiError> {
    let request: RegisterClientRequest = serde_json::from_slice(body)?;

    let mut session = state.service.session(context);
    session
        .try_validate(&request.merchant, &request.device, initial)
        .await?;

    let secret_key = session.try_registry(request.bundle).await?;

    info!(merchant = %request.merchant, device = %request.device, initial, "Device key issued");

    Ok(Json(RegisterClientResponse {
        merchant: request.merchant,
        device: request.device,
        secret_key,
    }))
}

/// Verify a registered device and return its bundle attributes
///
/// POST /v1/client/verify
pub async fn verify_client(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<VerifyClientResponse>, ApiError> {
    let request: VerifyClientRequest = serde_json::from_slice(&body)?;
    let context = request_context(addr, &method, &uri, &headers, &body);

    let mut session = state.service.session(context);
    session
        .try_validate(&request.merchant, &request.device, false)
        .await?;

    let attributes = session.attributes().await;

    Ok(Json(VerifyClientResponse {
        valid: true,
        merchant: session.merchant().to_string(),
        device: session.device().to_string(),
        validator: session.validator_name().map(str::to_string),
        attributes,
    }))
}

fn request_context(
    addr: SocketAddr,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
) -> RequestContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };

    let mut context = RequestContext::new(method.as_str(), uri.path())
        .with_client_ip(addr.ip())
        .with_body(body.to_vec());
    context.signature = header(SIGNATURE_HEADER);
    context.timestamp = header(TIMESTAMP_HEADER).and_then(|t| t.parse().ok());
    context.nonce = header(NONCE_HEADER);
    context
}
