//! Error types for fingersheet-web
//!
//! Handler errors render the HTML error pages. Processing failures never
//! reach this type; the upload handler turns them into flash messages.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

const NOT_FOUND_HTML: &str = include_str!("../templates/404.html");
const SERVER_ERROR_HTML: &str = include_str!("../templates/500.html");

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, Html(NOT_FOUND_HTML)).into_response(),
            other => {
                error!("Request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, Html(SERVER_ERROR_HTML)).into_response()
            }
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
