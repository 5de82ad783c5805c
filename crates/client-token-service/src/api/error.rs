//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::error::SessionError;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unknown merchant: {0}")]
    UnknownMerchant(String),

    #[error("Unregistered device: {0}")]
    UnregisteredDevice(String),

    #[error("Invalid signature")]
    InvalidSignature(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_)
            | ApiError::UnknownMerchant(_)
            | ApiError::UnregisteredDevice(_)
            | ApiError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::UnknownMerchant(_) => "UNKNOWN_MERCHANT",
            ApiError::UnregisteredDevice(_) => "UNREGISTERED_DEVICE",
            ApiError::InvalidSignature(_) => "INVALID_SIGNATURE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::InvalidSignature(msg)
            | ApiError::Internal(msg) => msg.clone(),
            ApiError::UnknownMerchant(merchant) => {
                format!("Merchant '{}' is unknown or disabled", merchant)
            }
            ApiError::UnregisteredDevice(device) => {
                format!("Device '{}' is not registered", device)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: self.code().to_string(),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MerchantNotFound(merchant) => ApiError::UnknownMerchant(merchant),
            SessionError::UnregisteredDevice { device, .. } => ApiError::UnregisteredDevice(device),
            SessionError::InvalidSignature(reason) => ApiError::InvalidSignature(reason),
            SessionError::NotAuthenticated
            | SessionError::EmptySecretKey(_)
            | SessionError::Validator(_) => ApiError::Unauthorized(err.to_string()),
            SessionError::PersistenceFailed(_) | SessionError::Storage(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON body: {}", err))
    }
}
