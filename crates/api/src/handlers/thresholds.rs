//! Handlers for threshold administration.
//!
//! Runs snapshot the active thresholds when they are evaluated, so edits
//! here only affect future runs.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use pqa_core::error::CoreError;
use pqa_core::quality_gate;
use pqa_core::types::DbId;
use pqa_db::models::threshold::{CreateThreshold, UpdateThreshold};
use pqa_db::repositories::ThresholdRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/thresholds
pub async fn list_thresholds(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let thresholds = ThresholdRepo::list_all(&state.pool).await?;
    Ok(Json(DataResponse { data: thresholds }))
}

/// POST /api/v1/thresholds
///
/// Create a threshold, or replace the values of the one with the same name.
pub async fn upsert_threshold(
    State(state): State<AppState>,
    Json(body): Json<CreateThreshold>,
) -> AppResult<impl IntoResponse> {
    quality_gate::validate_threshold_name(&body.name)?;
    quality_gate::validate_threshold(body.min_overall_score, body.max_data_loss_percentage)?;

    let threshold = ThresholdRepo::upsert(&state.pool, &body).await?;
    tracing::info!(
        threshold = %threshold.name,
        min_overall_score = threshold.min_overall_score,
        max_data_loss_percentage = threshold.max_data_loss_percentage,
        active = threshold.active,
        "Threshold saved",
    );
    Ok(Json(DataResponse { data: threshold }))
}

/// PATCH /api/v1/thresholds/{id}
pub async fn update_threshold(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<UpdateThreshold>,
) -> AppResult<impl IntoResponse> {
    let not_found = || CoreError::NotFound {
        entity: "Threshold",
        id,
    };
    let current = ThresholdRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(not_found)?;

    quality_gate::validate_threshold(
        body.min_overall_score.unwrap_or(current.min_overall_score),
        body.max_data_loss_percentage
            .unwrap_or(current.max_data_loss_percentage),
    )?;

    let threshold = ThresholdRepo::update(&state.pool, id, &body)
        .await?
        .ok_or_else(not_found)?;
    tracing::info!(threshold = %threshold.name, active = threshold.active, "Threshold updated");
    Ok(Json(DataResponse { data: threshold }))
}
