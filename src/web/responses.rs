//! HTTP response types and utilities
//!
//! Standardized envelopes and the mapping from errors to status codes. Each
//! task error kind gets its own status so operators can tell overload
//! (timeouts, cleared queue) apart from backend defects and bad requests.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{AppError, TaskError};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, String>>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error_with_details(message: String, details: HashMap<String, String>) -> Self {
        Self {
            details: Some(details),
            ..Self::error(message)
        }
    }
}

/// Status code for each task outcome kind
pub fn task_error_status(error: &TaskError) -> StatusCode {
    match error {
        TaskError::Configuration { .. } => StatusCode::BAD_REQUEST,
        TaskError::Spawn { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        TaskError::NonZeroExit { .. } => StatusCode::BAD_GATEWAY,
        TaskError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        TaskError::QueueCleared { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> Response {
    let (status, message, details) = match &error {
        AppError::Task(task_error) => (
            task_error_status(task_error),
            task_error.to_string(),
            Some(HashMap::from([(
                "kind".to_string(),
                task_error.kind().to_string(),
            )])),
        ),
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone(), None),
        AppError::Configuration { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Configuration error: {message}"),
            None,
        ),
        AppError::Figment(_) | AppError::Io(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Configuration could not be loaded".to_string(),
            None,
        ),
        AppError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {message}"),
            None,
        ),
    };

    if status.is_server_error() {
        tracing::error!("Request failed with {}: {}", status, error);
    } else {
        tracing::debug!("Request rejected with {}: {}", status, error);
    }

    let response = match details {
        Some(details) => ApiResponse::error_with_details(message, details),
        None => ApiResponse::error(message),
    };

    (status, Json(response)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        handle_error(self)
    }
}

/// Success response helper
pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}
