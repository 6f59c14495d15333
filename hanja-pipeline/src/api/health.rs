//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Dictionary entry count, absent when the database is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<i64>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    let entries = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM dictionary_entries")
        .fetch_one(&state.db)
        .await
        .ok();

    Json(HealthResponse {
        status: if entries.is_some() { "ok" } else { "degraded" }.to_string(),
        module: "hanja-pipeline".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        entries,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
