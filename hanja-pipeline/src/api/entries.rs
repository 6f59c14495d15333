//! Dictionary lookups

use super::PageParams;
use crate::db::{self, DictionaryEntry, Paged};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use hanja_common::Element;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ElementQuery {
    pub element: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// GET /entries/:character
pub async fn get_entry(
    State(state): State<AppState>,
    Path(character): Path<String>,
) -> ApiResult<Json<DictionaryEntry>> {
    db::get_entry(&state.db, &character, true)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Dictionary entry '{}'", character)))
}

/// GET /entries?element=&page=&per_page=
pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<ElementQuery>,
) -> ApiResult<Json<Paged<DictionaryEntry>>> {
    let element = query
        .element
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("query parameter 'element' is required".to_string()))?
        .parse::<Element>()
        .map_err(ApiError::BadRequest)?;

    let params = PageParams {
        page: query.page,
        per_page: query.per_page,
    };
    let page = db::list_by_element(&state.db, element, params.page()).await?;
    Ok(Json(page))
}

/// GET /readings/:reading
pub async fn find_by_reading(
    State(state): State<AppState>,
    Path(reading): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Paged<DictionaryEntry>>> {
    let page = db::find_by_reading(&state.db, &reading, params.page()).await?;
    Ok(Json(page))
}

pub fn entry_routes() -> Router<AppState> {
    Router::new()
        .route("/entries", get(list_entries))
        .route("/entries/:character", get(get_entry))
        .route("/readings/:reading", get(find_by_reading))
}
