//! # API Errors
//!
//! Every handler failure is converted into the JSON envelope
//! `{success: false, error, code?, details?}` here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::dump::DumpError;
use crate::engine::QueryError;

use super::request::{FieldError, ValidationError};

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Code reported for rejected request bodies
pub const VALIDATION_ERROR_CODE: &str = "VALIDATION_ERROR";

/// Handler errors
#[derive(Debug, Error)]
pub enum ApiError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Request body failed validation
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Request was well formed but cannot be acted on
    #[error("{0}")]
    BadRequest(String),

    /// No row matched
    #[error("{0}")]
    NotFound(String),

    /// Statement built from client input failed
    #[error("{0}")]
    Rejected(QueryError),

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Introspection or aggregate statement failed
    #[error("{0}")]
    Internal(QueryError),

    /// Export or import failed
    #[error("{0}")]
    Dump(#[from] DumpError),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Dump(DumpError::Import(_)) => StatusCode::BAD_REQUEST,
            ApiError::Dump(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code: SQLSTATE for engine failures
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Validation(_) => Some(VALIDATION_ERROR_CODE),
            ApiError::BadRequest(_) | ApiError::NotFound(_) => None,
            ApiError::Rejected(e) | ApiError::Internal(e) => e.code.as_deref(),
            ApiError::Dump(e) => e.query_error().code.as_deref(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl From<ApiError> for ErrorResponse {
    fn from(err: ApiError) -> Self {
        let code = err.code().map(str::to_string);
        let (error, details) = match err {
            ApiError::Validation(e) => ("Validation failed".to_string(), Some(e.errors)),
            other => (other.to_string(), None),
        };
        Self {
            success: false,
            error,
            code,
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else if !matches!(self, ApiError::NotFound(_)) {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        let body = Json(ErrorResponse::from(self));
        (status, body).into_response()
    }
}
