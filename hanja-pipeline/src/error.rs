//! Error types for hanja-pipeline
//!
//! - [`PipelineError`]: stage- and run-level failures
//! - [`ApiError`]: read API errors mapped to HTTP responses

use crate::types::{RecordIssue, StageKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Stage / run level error
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage could not produce any output
    #[error("Stage '{stage}' produced no output: {reason}")]
    NoOutput {
        stage: StageKind,
        reason: String,
        /// Record- or source-level problems that led to the failure
        issues: Vec<RecordIssue>,
    },

    /// A stage aborted the run (abort error mode)
    #[error("Pipeline aborted at stage '{stage}': {reason}")]
    Aborted { stage: StageKind, reason: String },

    /// A stage's input batch is not available on disk
    #[error("Missing input for stage '{stage}': {path}")]
    MissingInput { stage: StageKind, path: String },

    /// Worker pool failure
    #[error("Worker pool error: {0}")]
    Worker(String),

    /// Shared-library error (database, IO, config, serialization)
    #[error(transparent)]
    Common(#[from] hanja_common::Error),
}

impl PipelineError {
    pub fn no_output(stage: StageKind, reason: impl Into<String>) -> Self {
        PipelineError::NoOutput {
            stage,
            reason: reason.into(),
            issues: Vec::new(),
        }
    }

    /// Issues to record in the failed stage's result
    pub fn issues(&self) -> Vec<RecordIssue> {
        match self {
            PipelineError::NoOutput { reason, issues, .. } => {
                let mut all = issues.clone();
                all.push(RecordIssue::new(reason.clone()));
                all
            }
            other => vec![RecordIssue::new(other.to_string())],
        }
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Common(hanja_common::Error::Database(err))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Common(hanja_common::Error::Io(err))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Common(hanja_common::Error::Serialization(err))
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// hanja-common error
    #[error("Common error: {0}")]
    Common(#[from] hanja_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(hanja_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(hanja_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
