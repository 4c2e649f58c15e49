//! Error handling module
//!
//! HTTP-facing error type and its response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::WalletError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    // Engine errors
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    /// Status code and machine-readable code for this error
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::MissingParameter(_) => (StatusCode::BAD_REQUEST, "missing_parameter"),
            AppError::Wallet(err) => match err {
                WalletError::InsufficientFunds { .. } => {
                    (StatusCode::BAD_REQUEST, "insufficient_funds")
                }
                WalletError::WalletNotFound(_) => (StatusCode::NOT_FOUND, "wallet_not_found"),
                WalletError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "invalid_amount"),
                WalletError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status();

        let (error, details) = match &self {
            AppError::InvalidRequest(msg) | AppError::MissingParameter(msg) => {
                (self.to_string(), Some(msg.clone()))
            }
            AppError::Wallet(WalletError::WalletNotFound(id)) => {
                ("Wallet not found".to_string(), Some(id.clone()))
            }
            AppError::Wallet(err) if err.is_client_error() => (err.to_string(), None),

            // Internal details stay in the logs
            AppError::Wallet(err) => {
                tracing::error!(error = %err, "Wallet operation failed");
                ("Internal server error".to_string(), None)
            }
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
