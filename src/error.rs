//! Error handling module
//!
//! Every handler returns [`ApiResult`]; this is the only place an error is
//! turned into the public JSON envelope.

use crate::config::ConfigError;
use crate::identity::SignatureError;
use crate::proposal::ServiceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signature is not registered")]
    UnknownSignature,

    #[error("Signature belongs to {name}, whose status is {status}")]
    InactiveSignature { name: String, status: String },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::UnknownSignature => AppError::UnknownSignature,
            ServiceError::InactiveSignature { name, status } => {
                AppError::InactiveSignature { name, status }
            }
            ServiceError::Registry(e) => AppError::Internal(e.to_string()),
            ServiceError::Invalid(msg) => AppError::Validation(msg),
            ServiceError::NotOpen { .. } => AppError::Conflict(err.to_string()),
            ServiceError::Store { ref source, .. } if source.status() == Some(404) => {
                AppError::NotFound(err.to_string())
            }
            ServiceError::Store { .. } => AppError::Store(err.to_string()),
        }
    }
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        AppError::InvalidSignature(err.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match &self {
            AppError::Config(msg) => {
                error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    "A configuration error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::UnknownSignature => (
                StatusCode::UNAUTHORIZED,
                "UNKNOWN_SIGNATURE",
                self.to_string(),
                None,
            ),
            AppError::InactiveSignature { status, .. } => (
                StatusCode::FORBIDDEN,
                "INACTIVE_SIGNATURE",
                self.to_string(),
                Some(format!("Recorded status: {}", status)),
            ),
            AppError::InvalidSignature(msg) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_SIGNATURE",
                "Request signature could not be verified".to_string(),
                Some(msg.clone()),
            ),
            AppError::Store(msg) => {
                error!("Store error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "STORE_ERROR",
                    "The change-request store rejected the operation".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(error_code.to_string()),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}
