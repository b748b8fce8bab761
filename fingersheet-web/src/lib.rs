//! fingersheet-web library interface for testing
//!
//! Exposes the application state and router so integration tests can drive
//! the service without binding a socket.

pub mod api;
pub mod error;
pub mod flash;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::handler::HandlerWithoutStateExt;
use axum::Router;
use chrono::{DateTime, Utc};
use fingersheet_common::AppConfig;
use fingersheet_engine::SheetProcessor;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration
    pub config: Arc<AppConfig>,
    /// OCR/parse, fingering and annotation pipeline
    pub processor: Arc<SheetProcessor>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last processing error, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(config: AppConfig, processor: SheetProcessor) -> Self {
        Self {
            config: Arc::new(config),
            processor: Arc::new(processor),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// State with the real Tesseract/pdftoppm adapters
    pub fn from_config(config: AppConfig) -> Self {
        let processor = SheetProcessor::from_config(&config);
        Self::new(config, processor)
    }

    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_folder)
        .not_found_service(api::not_found.into_service());

    Router::new()
        .merge(api::ui_routes())
        .merge(api::upload_routes())
        .merge(api::health_routes())
        .nest_service("/uploads", uploads)
        .fallback(api::not_found)
        .layer(DefaultBodyLimit::max(state.config.max_content_length))
        .layer(CatchPanicLayer::custom(api::handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
