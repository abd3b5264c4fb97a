//! Error handling for the AquaCrop irrigation engine
//!
//! Component errors are absorbed at the boundary of the trigger that owns
//! them and surface as activity log entries. `AppError` is only used by the
//! HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Environmental or vegetation provider failure
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Network(String),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed provider payload: {0}")]
    Malformed(String),

    #[error("Unsupported provider unit '{unit}' for {variable}")]
    UnsupportedUnit { variable: String, unit: String },
}

/// Schedule computation or oracle failure
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Scheduling oracle request failed: {0}")]
    OracleUnavailable(String),

    #[error("Scheduling oracle returned {status}: {body}")]
    OracleStatus { status: u16, body: String },

    #[error("Unparseable oracle output: {0}")]
    MalformedOutput(String),

    #[error("Invalid irrigation event: {0}")]
    InvalidEvent(String),
}

/// Alert could not be handed to the sink
#[derive(Error, Debug)]
pub enum NotificationDeliveryError {
    #[error("Alert delivery failed: {0}")]
    Delivery(String),

    #[error("Alert sink rejected the alert: {0}")]
    Rejected(String),
}

/// Field store mutation failure
#[derive(Error, Debug, PartialEq)]
pub enum FieldStoreError {
    #[error("Field not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(&'static str),

    #[error("Session is read-only")]
    ReadOnly,
}

/// Application error types for the HTTP surface
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Session is read-only")]
    ReadOnly,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Schedule computation already in progress")]
    AlreadyRunning,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<FieldStoreError> for AppError {
    fn from(err: FieldStoreError) -> Self {
        match err {
            FieldStoreError::NotFound(id) => AppError::NotFound(format!("Field {}", id)),
            FieldStoreError::Validation(msg) => AppError::ValidationError(msg.to_string()),
            FieldStoreError::ReadOnly => AppError::ReadOnly,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::ValidationError(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", resource),
            ),
            AppError::ReadOnly => (
                StatusCode::FORBIDDEN,
                "READ_ONLY",
                "Guest mode is read-only. Sign in to manage your own farm.".to_string(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::AlreadyRunning => (
                StatusCode::CONFLICT,
                "ALREADY_RUNNING",
                "A schedule computation is already in progress".to_string(),
            ),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        tracing::error!("Error: {:?}", self);

        (
            status,
            Json(ErrorResponse {
                error: ErrorDetail {
                    code: code.to_string(),
                    message,
                },
            }),
        )
            .into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
