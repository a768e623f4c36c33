//! Common error types for the generation gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed: {0}")]
    AuthInvalid(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status, error type and machine-readable code for this error
    pub fn classify(&self) -> (StatusCode, &'static str, Option<&'static str>) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_json")),
            AppError::UnknownModel(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("unknown_model")),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
            AppError::AuthInvalid(_) => (StatusCode::FORBIDDEN, "authentication_error", Some("invalid_token")),
            AppError::JobNotFound(_) => (StatusCode::NOT_FOUND, "not_found_error", Some("job_not_found")),
            AppError::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_error", Some("rate_limit_exceeded")),
            AppError::WorkerUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "worker_error", Some("worker_unavailable")),
            AppError::InferenceFailure(_) => (StatusCode::BAD_GATEWAY, "worker_error", Some("inference_failure")),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
        }
    }

    /// Whether the failure is attributable to the caller rather than the gateway or a worker
    pub fn is_client_error(&self) -> bool {
        self.classify().0.is_client_error()
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, error_type: &str, code: Option<&str>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = self.classify();
        let body = Json(ErrorResponse::new(self.to_string(), error_type, code));

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
