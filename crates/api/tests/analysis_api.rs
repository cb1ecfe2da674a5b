//! HTTP-level integration tests for submitting analyses and reading results.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, build_test_app, build_test_app_with, delete, get, post_json, put_bytes, TestApp};
use pqa_core::file_type::FileType;
use pqa_db::repositories::AnalysisRunRepo;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

const ORIGINAL: &str = "DeviceInfo/VendorNumber=0x0000029C\n\
                        DeviceInfo/ProductNumber=0x00000104\n\
                        Objects/Param00/Value=10\n\
                        Objects/Param01/Value=20\n";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn upload(app: &TestApp, device_id: i64, doc: &str) {
    let response = put_bytes(
        app.router(),
        &format!("/api/v1/devices/{device_id}/files/eds"),
        doc.as_bytes(),
    )
    .await;
    assert!(response.status().is_success(), "upload failed: {}", response.status());
}

async fn submit(app: &TestApp, device_id: i64) -> serde_json::Value {
    let response = post_json(
        app.router(),
        "/api/v1/analyze",
        json!({ "device_id": device_id, "file_type": "eds" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    body_json(response).await["data"].clone()
}

fn run_id_of(submission: &serde_json::Value) -> Uuid {
    submission["run_id"].as_str().unwrap().parse().unwrap()
}

async fn analyze_and_wait(app: &TestApp, device_id: i64) -> Uuid {
    let run_id = run_id_of(&submit(app, device_id).await);
    app.state.executor.wait(run_id).await.unwrap();
    run_id
}

async fn analysis(app: &TestApp, run_id: Uuid) -> serde_json::Value {
    let response = get(app.router(), &format!("/api/v1/analyses/{run_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// Test: identical reconstruction passes at 100
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_identical_reconstruction_passes(pool: PgPool) {
    let app = build_test_app(pool);
    upload(&app, 1, ORIGINAL).await;
    app.parser.set(1, FileType::Eds, ORIGINAL).await;

    let submission = submit(&app, 1).await;
    assert_eq!(submission["joined"], false);
    let run_id = run_id_of(&submission);
    app.state.executor.wait(run_id).await.unwrap();

    let data = analysis(&app, run_id).await;
    assert_eq!(data["status"], "pass");
    assert_eq!(data["run"]["overall_score"], 100.0);
    assert_eq!(data["run"]["data_loss_percentage"], 0.0);
    assert!(data["job"].is_null());

    let response = get(app.router(), &format!("/api/v1/analyses/{run_id}/findings")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: re-uploading earlier content makes it the analyzed original
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_reupload_restores_earlier_original(pool: PgPool) {
    let app = build_test_app(pool);
    let revised = ORIGINAL.replace("Param01/Value=20", "Param01/Value=25");
    upload(&app, 3, ORIGINAL).await;
    upload(&app, 3, &revised).await;

    let response = put_bytes(app.router(), "/api/v1/devices/3/files/eds", ORIGINAL.as_bytes()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let first_id = body_json(response).await["data"]["archived_file"]["id"].clone();

    app.parser.set(3, FileType::Eds, ORIGINAL).await;
    let run_id = analyze_and_wait(&app, 3).await;

    let data = analysis(&app, run_id).await;
    assert_eq!(data["status"], "pass");
    assert_eq!(data["run"]["overall_score"], 100.0);
    assert_eq!(data["run"]["archived_file_id"], first_id);
}

// ---------------------------------------------------------------------------
// Test: critical loss fails the run and opens one ticket
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_critical_loss_fails_and_opens_ticket(pool: PgPool) {
    let app = build_test_app(pool);
    upload(&app, 2, ORIGINAL).await;
    let reconstruction: String = ORIGINAL
        .lines()
        .filter(|l| !l.starts_with("DeviceInfo/VendorNumber"))
        .map(|l| format!("{l}\n"))
        .collect();
    app.parser.set(2, FileType::Eds, &reconstruction).await;

    let run_id = analyze_and_wait(&app, 2).await;
    let data = analysis(&app, run_id).await;
    assert_eq!(data["status"], "fail");
    assert_eq!(data["run"]["critical_data_loss"], true);
    assert_eq!(data["remediations"][0]["threshold_name"], "standard");

    let response = get(app.router(), &format!("/api/v1/analyses/{run_id}/findings")).await;
    let findings = body_json(response).await["data"].clone();
    assert_eq!(findings[0]["location"], "DeviceInfo/VendorNumber");
    assert_eq!(findings[0]["severity"], "critical");

    for _ in 0..100 {
        if !app.tickets.opened.lock().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(app.tickets.opened.lock().await.len(), 1);

    // A second failure inside the cool-down opens nothing new.
    let second = analyze_and_wait(&app, 2).await;
    assert!(analysis(&app, second).await["remediations"]
        .as_array()
        .unwrap()
        .is_empty());
    assert_eq!(app.tickets.opened.lock().await.len(), 1);
}

// ---------------------------------------------------------------------------
// Test: missing archive and unknown device record error runs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_missing_archive_records_error_run(pool: PgPool) {
    let app = build_test_app(pool);
    let run_id = analyze_and_wait(&app, 3).await;

    let data = analysis(&app, run_id).await;
    assert_eq!(data["status"], "error");
    assert_eq!(data["run"]["error_kind"], "missing_archive");
    assert!(data["run"]["overall_score"].is_null());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_unknown_device_records_reconstruction_error(pool: PgPool) {
    let app = build_test_app(pool);
    upload(&app, 4, ORIGINAL).await;

    let run_id = analyze_and_wait(&app, 4).await;
    let data = analysis(&app, run_id).await;
    assert_eq!(data["status"], "error");
    assert_eq!(data["run"]["error_kind"], "reconstruction");
    assert!(data["remediations"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: concurrent requests for one target share a run
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_concurrent_requests_join_one_run(pool: PgPool) {
    let app = build_test_app_with(
        pool,
        common::test_pipeline_config(),
        common::FakeParser::slow(Duration::from_millis(300)),
    );
    upload(&app, 5, ORIGINAL).await;
    app.parser.set(5, FileType::Eds, ORIGINAL).await;

    let first = submit(&app, 5).await;
    let second = submit(&app, 5).await;
    assert_eq!(first["run_id"], second["run_id"]);
    assert_eq!(second["joined"], true);

    app.state.executor.wait(run_id_of(&first)).await.unwrap();
    let response = get(app.router(), "/api/v1/devices/5/analyses").await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: backpressure refuses work beyond capacity
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_full_executor_returns_503(pool: PgPool) {
    let mut pipeline = common::test_pipeline_config();
    pipeline.workers = 1;
    pipeline.queue_limit = 0;
    let app = build_test_app_with(pool, pipeline, common::FakeParser::slow(Duration::from_secs(5)));
    upload(&app, 6, ORIGINAL).await;
    upload(&app, 7, ORIGINAL).await;

    let first = submit(&app, 6).await;
    let response = post_json(
        app.router(),
        "/api/v1/analyze",
        json!({ "device_id": 7, "file_type": "eds" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "OVERLOADED");

    let response = delete(app.router(), &format!("/api/v1/analyses/{}", first["run_id"].as_str().unwrap())).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Test: cancellation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_in_flight_analysis_can_be_cancelled(pool: PgPool) {
    let app = build_test_app_with(
        pool.clone(),
        common::test_pipeline_config(),
        common::FakeParser::slow(Duration::from_secs(5)),
    );
    upload(&app, 8, ORIGINAL).await;
    app.parser.set(8, FileType::Eds, ORIGINAL).await;

    let run_id = run_id_of(&submit(&app, 8).await);
    let response = delete(app.router(), &format!("/api/v1/analyses/{run_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["state"], "cancelled");

    let data = analysis(&app, run_id).await;
    assert_eq!(data["status"], "cancelled");
    assert!(data["run"].is_null());
    assert!(AnalysisRunRepo::find_by_id(&pool, run_id).await.unwrap().is_none());

    let response = delete(app.router(), &format!("/api/v1/analyses/{run_id}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_committed_run_cannot_be_cancelled(pool: PgPool) {
    let app = build_test_app(pool);
    upload(&app, 9, ORIGINAL).await;
    app.parser.set(9, FileType::Eds, ORIGINAL).await;
    let run_id = analyze_and_wait(&app, 9).await;

    let response = delete(app.router(), &format!("/api/v1/analyses/{run_id}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

// ---------------------------------------------------------------------------
// Test: validation and lookups
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_invalid_requests_are_rejected(pool: PgPool) {
    let app = build_test_app(pool);

    let response = post_json(
        app.router(),
        "/api/v1/analyze",
        json!({ "device_id": 1, "file_type": "pdf" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = post_json(
        app.router(),
        "/api/v1/analyze",
        json!({ "device_id": 0, "file_type": "eds" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    let response = get(app.router(), "/api/v1/devices/1/analyses?file_type=bogus").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_unknown_run_returns_404(pool: PgPool) {
    let app = build_test_app(pool);
    let run_id = Uuid::now_v7();

    let response = get(app.router(), &format!("/api/v1/analyses/{run_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");

    let response = get(app.router(), &format!("/api/v1/analyses/{run_id}/findings")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = delete(app.router(), &format!("/api/v1/analyses/{run_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_device_history_filters_by_file_type(pool: PgPool) {
    let app = build_test_app(pool);
    upload(&app, 10, ORIGINAL).await;
    app.parser.set(10, FileType::Eds, ORIGINAL).await;
    analyze_and_wait(&app, 10).await;
    analyze_and_wait(&app, 10).await;

    let response = get(app.router(), "/api/v1/devices/10/analyses?file_type=eds&limit=1").await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 1);

    let response = get(app.router(), "/api/v1/devices/10/analyses?file_type=xdd").await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());

    let response = get(app.router(), "/api/v1/devices/10/analyses").await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 2);
}
