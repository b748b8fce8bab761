//! 404 fallback and panic recovery

use axum::{body::Body, http::Response, response::IntoResponse};
use std::any::Any;

use crate::ApiError;

/// Fallback for unknown routes and missing downloads
pub async fn not_found() -> ApiError {
    ApiError::NotFound("page".to_string())
}

/// Render the 500 page for a panicking handler; the panic message is
/// logged, never shown
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(detail).into_response()
}
