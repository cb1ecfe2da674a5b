//! HTTP-level integration tests for threshold administration.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, patch_json, post_json};
use serde_json::json;
use sqlx::PgPool;

async fn threshold_id(app: &common::TestApp, name: &str) -> i64 {
    let response = get(app.router(), "/api/v1/thresholds").await;
    body_json(response).await["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == name)
        .and_then(|t| t["id"].as_i64())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Test: GET /thresholds lists the shipped thresholds
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_lists_shipped_thresholds(pool: PgPool) {
    let app = build_test_app(pool);
    let response = get(app.router(), "/api/v1/thresholds").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let names: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["default", "standard", "strict"]);
}

// ---------------------------------------------------------------------------
// Test: POST /thresholds upserts by name
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_upsert_creates_then_replaces(pool: PgPool) {
    let app = build_test_app(pool);

    let response = post_json(
        app.router(),
        "/api/v1/thresholds",
        json!({ "name": "nightly", "min_overall_score": 90, "max_data_loss_percentage": 10 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await["data"].clone();
    assert_eq!(created["active"], true);
    assert_eq!(created["auto_ticket_on_fail"], false);

    let response = post_json(
        app.router(),
        "/api/v1/thresholds",
        json!({
            "name": "nightly",
            "min_overall_score": 92.5,
            "max_data_loss_percentage": 8,
            "auto_ticket_on_fail": true
        }),
    )
    .await;
    let replaced = body_json(response).await["data"].clone();
    assert_eq!(replaced["id"], created["id"]);
    assert_eq!(replaced["min_overall_score"], 92.5);
    assert_eq!(replaced["auto_ticket_on_fail"], true);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_upsert_validates_input(pool: PgPool) {
    let app = build_test_app(pool);

    let response = post_json(
        app.router(),
        "/api/v1/thresholds",
        json!({ "name": "too-high", "min_overall_score": 150, "max_data_loss_percentage": 5 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = post_json(
        app.router(),
        "/api/v1/thresholds",
        json!({ "name": "Bad Name", "min_overall_score": 90, "max_data_loss_percentage": 5 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: PATCH /thresholds/{id}
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_patch_updates_selected_fields(pool: PgPool) {
    let app = build_test_app(pool);
    let id = threshold_id(&app, "strict").await;

    let response = patch_json(
        app.router(),
        &format!("/api/v1/thresholds/{id}"),
        json!({ "active": true, "min_overall_score": 99 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["active"], true);
    assert_eq!(data["min_overall_score"], 99.0);
    assert_eq!(data["max_data_loss_percentage"], 2.0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_patch_rejects_invalid_values_and_unknown_ids(pool: PgPool) {
    let app = build_test_app(pool);
    let id = threshold_id(&app, "standard").await;

    let response = patch_json(
        app.router(),
        &format!("/api/v1/thresholds/{id}"),
        json!({ "max_data_loss_percentage": -1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = patch_json(
        app.router(),
        "/api/v1/thresholds/999999",
        json!({ "active": false }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Threshold with id 999999 not found");
}
