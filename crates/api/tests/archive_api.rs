//! HTTP-level integration tests for archiving originals and verifying blobs.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, put_bytes};
use pqa_core::hashing::sha256_hex;
use pqa_events::bus::ARCHIVE_INTEGRITY_FAILED;
use sqlx::PgPool;

const DOC: &[u8] = b"DeviceInfo/VendorNumber=0x0000029C\n";

// ---------------------------------------------------------------------------
// Test: identical uploads are stored once
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_repeated_upload_is_idempotent(pool: PgPool) {
    let app = build_test_app(pool);

    let response = put_bytes(app.router(), "/api/v1/devices/1/files/eds", DOC).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let first = body_json(response).await["data"].clone();
    assert_eq!(first["created"], true);
    assert_eq!(first["archived_file"]["content_hash"], sha256_hex(DOC));
    assert_eq!(first["archived_file"]["size_bytes"], DOC.len());

    let response = put_bytes(app.router(), "/api/v1/devices/1/files/eds", DOC).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await["data"].clone();
    assert_eq!(second["created"], false);
    assert_eq!(second["archived_file"]["id"], first["archived_file"]["id"]);

    // Another device with the same bytes shares the blob but gets its own row.
    let response = put_bytes(app.router(), "/api/v1/devices/2/files/eds", DOC).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_invalid_uploads_are_rejected(pool: PgPool) {
    let app = build_test_app(pool);

    let response = put_bytes(app.router(), "/api/v1/devices/1/files/eds", b"").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = put_bytes(app.router(), "/api/v1/devices/1/files/pdf", DOC).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = put_bytes(app.router(), "/api/v1/devices/-3/files/eds", DOC).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: verification
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_stored_blob_verifies(pool: PgPool) {
    let app = build_test_app(pool);
    put_bytes(app.router(), "/api/v1/devices/1/files/xdd", DOC).await;

    let hash = sha256_hex(DOC);
    let response = get(app.router(), &format!("/api/v1/archive/{hash}/verify")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["verified"], true);
    assert_eq!(data["size_bytes"], DOC.len());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_tampered_blob_raises_alert(pool: PgPool) {
    let app = build_test_app(pool);
    put_bytes(app.router(), "/api/v1/devices/1/files/eds", DOC).await;

    let hash = sha256_hex(DOC);
    let path = app
        .blob_dir
        .path()
        .join(&hash[0..2])
        .join(&hash[2..4])
        .join(&hash);
    std::fs::write(path, b"DeviceInfo/VendorNumber=0x1\n").unwrap();

    let mut alerts = app.state.event_bus.subscribe();
    let response = get(app.router(), &format!("/api/v1/archive/{hash}/verify")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "ARCHIVE_INTEGRITY_ERROR");

    let event = alerts.recv().await.unwrap();
    assert_eq!(event.event_type, ARCHIVE_INTEGRITY_FAILED);
    assert_eq!(event.payload["content_hash"], hash);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_unknown_or_malformed_hash(pool: PgPool) {
    let app = build_test_app(pool);

    let response = get(
        app.router(),
        &format!("/api/v1/archive/{}/verify", "0".repeat(64)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app.router(), "/api/v1/archive/not-a-hash/verify").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
