//! Handlers for submitting analyses and reading their results.
//!
//! `POST /analyze` returns immediately with a run id; the run is then
//! observable through `GET /analyses/{run_id}`, first as a live job state
//! and, once committed, as the stored AnalysisRun.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use pqa_core::analysis_status::AnalysisKey;
use pqa_core::error::CoreError;
use pqa_core::file_type::FileType;
use pqa_core::types::DbId;
use pqa_db::models::analysis_run::AnalysisRun;
use pqa_db::models::remediation::RemediationRecord;
use pqa_db::repositories::{AnalysisRunRepo, DiffFindingRepo, RemediationRepo};
use pqa_pipeline::{ExecutorError, JobSnapshot};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::query::{clamp_limit, DeviceHistoryParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /analyze`.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub device_id: DbId,
    pub file_type: String,
}

/// Combined view of an analysis: the committed run if there is one, the
/// live job state otherwise.
#[derive(Debug, Serialize)]
pub struct AnalysisStatus {
    pub run_id: Uuid,
    pub status: String,
    pub run: Option<AnalysisRun>,
    pub job: Option<JobSnapshot>,
    pub remediations: Vec<RemediationRecord>,
}

fn run_not_found(run_id: Uuid) -> AppError {
    AppError::Executor(ExecutorError::NotFound(run_id))
}

fn parse_device_id(device_id: DbId) -> AppResult<DbId> {
    if device_id <= 0 {
        return Err(AppError::BadRequest(format!(
            "device_id must be positive, got {device_id}"
        )));
    }
    Ok(device_id)
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// POST /api/v1/analyze
///
/// Starts an analysis of the latest archived original, or joins the one
/// already in flight for the same device and file type. Responds `202`.
pub async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> AppResult<impl IntoResponse> {
    let device_id = parse_device_id(body.device_id)?;
    let file_type = FileType::from_name(&body.file_type)?;

    let submission = state
        .executor
        .submit(AnalysisKey::new(device_id, file_type))
        .await?;

    tracing::info!(
        run_id = %submission.run_id,
        device_id,
        file_type = %file_type,
        joined = submission.joined,
        "Analysis requested",
    );
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: submission })))
}

// ---------------------------------------------------------------------------
// Status / cancel
// ---------------------------------------------------------------------------

/// GET /api/v1/analyses/{run_id}
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    if let Some(run) = AnalysisRunRepo::find_by_id(&state.pool, run_id).await? {
        let remediations = RemediationRepo::list_for_run(&state.pool, run_id).await?;
        return Ok(Json(DataResponse {
            data: AnalysisStatus {
                run_id,
                status: run.status.clone(),
                run: Some(run),
                job: None,
                remediations,
            },
        }));
    }

    let job = state
        .executor
        .status(run_id)
        .await
        .ok_or_else(|| run_not_found(run_id))?;
    Ok(Json(DataResponse {
        data: AnalysisStatus {
            run_id,
            status: job.state.as_str().to_string(),
            run: None,
            job: Some(job),
            remediations: Vec::new(),
        },
    }))
}

/// DELETE /api/v1/analyses/{run_id}
///
/// Cancels a queued or running analysis. A committed run is immutable and
/// answers `409`.
pub async fn cancel_analysis(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    match state.executor.cancel(run_id).await {
        Ok(snapshot) => Ok(Json(DataResponse { data: snapshot })),
        Err(ExecutorError::NotFound(_)) => {
            match AnalysisRunRepo::find_by_id(&state.pool, run_id).await? {
                Some(run) => Err(CoreError::Conflict(format!(
                    "Analysis {run_id} was already committed with status '{}'",
                    run.status
                ))
                .into()),
                None => Err(run_not_found(run_id)),
            }
        }
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Findings / history
// ---------------------------------------------------------------------------

/// GET /api/v1/analyses/{run_id}/findings
pub async fn list_findings(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    if AnalysisRunRepo::find_by_id(&state.pool, run_id).await?.is_none() {
        return Err(run_not_found(run_id));
    }
    let findings = DiffFindingRepo::list_for_run(&state.pool, run_id).await?;
    Ok(Json(DataResponse { data: findings }))
}

/// GET /api/v1/devices/{device_id}/analyses?file_type=&limit=
pub async fn device_history(
    State(state): State<AppState>,
    Path(device_id): Path<DbId>,
    Query(params): Query<DeviceHistoryParams>,
) -> AppResult<impl IntoResponse> {
    let device_id = parse_device_id(device_id)?;
    let file_type = params
        .file_type
        .as_deref()
        .map(FileType::from_name)
        .transpose()?;

    let runs = AnalysisRunRepo::list_for_device(
        &state.pool,
        device_id,
        file_type.map(FileType::as_str),
        clamp_limit(params.limit),
    )
    .await?;
    Ok(Json(DataResponse { data: runs }))
}
