//! Handlers for archiving original device files and re-verifying blobs.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use pqa_core::file_type::FileType;
use pqa_core::types::DbId;
use pqa_db::models::archived_file::ArchivedFile;
use pqa_events::bus::ARCHIVE_INTEGRITY_FAILED;
use pqa_events::PqaEvent;
use pqa_pipeline::ArchiveError;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub archived_file: ArchivedFile,
    /// `false` when identical bytes were already archived for this target.
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct VerifyResult {
    pub content_hash: String,
    pub size_bytes: usize,
    pub verified: bool,
}

/// PUT /api/v1/devices/{device_id}/files/{file_type}
///
/// The body is the raw original file. Responds `201` for new content and
/// `200` when the same bytes were already archived.
pub async fn upload_original(
    State(state): State<AppState>,
    Path((device_id, file_type)): Path<(DbId, String)>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    if device_id <= 0 {
        return Err(AppError::BadRequest(format!(
            "device_id must be positive, got {device_id}"
        )));
    }
    let file_type = FileType::from_name(&file_type)?;
    if body.is_empty() {
        return Err(AppError::BadRequest(
            "Upload body must not be empty".to_string(),
        ));
    }

    let (archived_file, created) = state
        .archive
        .archive_device_file(&state.pool, device_id, file_type, &body)
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(DataResponse {
            data: UploadResult {
                archived_file,
                created,
            },
        }),
    ))
}

/// GET /api/v1/archive/{content_hash}/verify
///
/// Integrity failures are raised as operational alerts as well as returned.
pub async fn verify_blob(
    State(state): State<AppState>,
    Path(content_hash): Path<String>,
) -> AppResult<impl IntoResponse> {
    match state.archive.verify(&content_hash).await {
        Ok(bytes) => Ok(Json(DataResponse {
            data: VerifyResult {
                content_hash,
                size_bytes: bytes.len(),
                verified: true,
            },
        })),
        Err(e @ ArchiveError::Integrity { .. }) => {
            state.event_bus.publish(
                PqaEvent::new(ARCHIVE_INTEGRITY_FAILED).with_payload(serde_json::json!({
                    "content_hash": content_hash,
                    "error": e.to_string(),
                })),
            );
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
