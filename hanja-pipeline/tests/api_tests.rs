//! HTTP read API tests
//!
//! The router is exercised in-process with `tower::ServiceExt::oneshot`
//! against a dictionary built by a full pipeline run.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use hanja_common::Element;
use hanja_pipeline::db::{DictionaryEntry, Paged};
use hanja_pipeline::types::{DecidedBy, ReviewStatus};
use hanja_pipeline::{build_router, AppState};
use helpers::{conflicting_env, TestEnv};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

// Percent-encoded path segments
const HYEON_CHAR: &str = "%E8%B3%A2"; // 賢
const HYEON_READING: &str = "%ED%98%84"; // 현

async fn app() -> (TestEnv, Router) {
    let env = conflicting_env().await;
    env.run_default().await;
    let router = build_router(AppState::new(env.pool.clone()));
    (env, router)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

#[tokio::test]
async fn test_health_reports_entry_count() {
    let (_env, router) = app().await;

    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["module"], "hanja-pipeline");
    assert_eq!(health["entries"], 2);
}

#[tokio::test]
async fn test_entry_lookup_records_usage() {
    let (_env, router) = app().await;
    let uri = format!("/entries/{}", HYEON_CHAR);

    let (status, body) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::OK);
    let entry: DictionaryEntry = serde_json::from_slice(&body).unwrap();
    assert_eq!(entry.character, "賢");
    assert_eq!(entry.usage_count, 1);

    let (_, body) = get(&router, &uri).await;
    let entry: DictionaryEntry = serde_json::from_slice(&body).unwrap();
    assert_eq!(entry.usage_count, 2);
}

#[tokio::test]
async fn test_unknown_entry_is_404() {
    let (_env, router) = app().await;

    let (status, body) = get(&router, "/entries/%E6%B0%B4").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_list_by_element_requires_valid_element() {
    let (_env, router) = app().await;

    let (status, body) = get(&router, "/entries?element=wood&page=1&per_page=10").await;
    assert_eq!(status, StatusCode::OK);
    let page: Paged<DictionaryEntry> = serde_json::from_slice(&body).unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.per_page, 10);

    let (status, _) = get(&router, "/entries?element=purple").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&router, "/entries").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reading_search() {
    let (_env, router) = app().await;

    let (status, body) = get(&router, &format!("/readings/{}", HYEON_READING)).await;
    assert_eq!(status, StatusCode::OK);
    let page: Paged<DictionaryEntry> = serde_json::from_slice(&body).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].character, "賢");
}

#[tokio::test]
async fn test_review_queue_and_manual_decision() {
    let (_env, router) = app().await;

    let (status, body) = get(&router, "/review").await;
    assert_eq!(status, StatusCode::OK);
    let queue: Paged<DictionaryEntry> = serde_json::from_slice(&body).unwrap();
    assert_eq!(queue.total, 1);
    assert_eq!(queue.items[0].character, "賢");

    let uri = format!("/review/{}", HYEON_CHAR);
    let (status, body) = post_json(&router, &uri, serde_json::json!({"element": "metal"})).await;
    assert_eq!(status, StatusCode::OK);
    let entry: DictionaryEntry = serde_json::from_slice(&body).unwrap();
    assert_eq!(entry.element, Some(Element::Metal));
    assert_eq!(entry.decided_by, DecidedBy::Manual);
    assert_eq!(entry.review_status, ReviewStatus::Ok);

    let (_, body) = get(&router, "/review").await;
    let queue: Paged<DictionaryEntry> = serde_json::from_slice(&body).unwrap();
    assert_eq!(queue.total, 0);
}

#[tokio::test]
async fn test_manual_decision_rejects_bad_input() {
    let (_env, router) = app().await;

    let uri = format!("/review/{}", HYEON_CHAR);
    let (status, _) = post_json(&router, &uri, serde_json::json!({"element": "purple"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(&router, "/review/%E6%B0%B4", serde_json::json!({"element": "water"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
