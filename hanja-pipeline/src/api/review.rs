//! Review queue and manual decisions

use super::PageParams;
use crate::db::{self, DictionaryEntry, Paged};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use hanja_common::Element;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub element: String,
}

/// GET /review
pub async fn review_queue(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Paged<DictionaryEntry>>> {
    let page = db::review_queue(&state.db, params.page()).await?;
    Ok(Json(page))
}

/// POST /review/:character  `{"element": "wood"}`
pub async fn resolve_entry(
    State(state): State<AppState>,
    Path(character): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Json<DictionaryEntry>> {
    let element = request
        .element
        .trim()
        .parse::<Element>()
        .map_err(ApiError::BadRequest)?;

    let entry = db::manual_resolve(&state.db, &character, element).await?;
    Ok(Json(entry))
}

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/review", get(review_queue))
        .route("/review/:character", post(resolve_entry))
}
