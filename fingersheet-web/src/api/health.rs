//! `GET /health`: liveness plus the most recent processing failure

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    /// Message recorded by the last failed upload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl HealthResponse {
    async fn snapshot(state: &AppState) -> Self {
        Self {
            status: "ok",
            module: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: whole_seconds_between(state.startup_time, Utc::now()),
            last_error: state.last_error.read().await.clone(),
        }
    }
}

/// Clamped at zero if the wall clock stepped backwards
fn whole_seconds_between(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((now - start).num_seconds()).unwrap_or(0)
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::snapshot(&state).await)
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
