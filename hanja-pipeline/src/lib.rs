//! # hanja-pipeline
//!
//! Batch pipeline that builds the Hanja dictionary:
//!
//! ```text
//! Ingest → Normalize → Dedup/Merge → Resolve → Validate → Load → Report
//! ```
//!
//! plus the read API over the resulting SQLite dictionary.
//!
//! # Architecture
//!
//! - [`types`]: stage records and the [`types::Stage`] trait
//! - [`sources`]: bundled, file and HTTP record sources
//! - [`stages`]: the seven stages
//! - [`fusion`]: evidence weighting and element resolution
//! - [`validators`]: ordered validation rules
//! - [`db`]: dictionary persistence and queries
//! - [`workflow`]: batch files, checkpoint and the orchestrator
//! - [`api`]: HTTP read API

pub mod api;
pub mod db;
pub mod error;
pub mod fusion;
pub mod sources;
pub mod stages;
pub mod types;
pub mod utils;
pub mod validators;
pub mod workflow;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, PipelineError};
pub use workflow::{Orchestrator, RunOptions, RunSummary};

/// Shared state for the read API
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            startup_time: Utc::now(),
        }
    }
}

/// Build the read API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::entry_routes())
        .merge(api::review_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
