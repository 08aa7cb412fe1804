//! Error types

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by a single model invocation
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The chat request could not be assembled
    #[error("failed to build chat request: {0}")]
    Request(String),

    /// The provider answered with a non-success status
    #[error("provider returned {status}: {message}")]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// The request never produced a response
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not a chat completion
    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether the provider rejected the call for exceeding a request quota
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProviderError::Api {
                status,
                message,
                code,
            } => {
                *status == 429
                    || code.as_deref() == Some("rate_limit_exceeded")
                    || message.to_lowercase().contains("rate limit")
            }
            _ => false,
        }
    }
}

/// No JSON object could be recovered from model output
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no valid JSON found in model output")]
pub struct ExtractionError;

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API key is required")]
    CredentialMissing,

    #[error("{0}")]
    BadRequest(String),

    /// Upstream failure; the message is what the caller sees
    #[error("{0}")]
    Upstream(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::CredentialMissing => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
