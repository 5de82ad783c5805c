//! API request handlers

pub mod client;

pub use client::{
    register_client, renew_client, verify_client, AppState, RegisterClientRequest, RegisterClientResponse,
    VerifyClientRequest, VerifyClientResponse,
};
