//! Handlers for the quality dashboard.
//!
//! Summary and trends are served from the in-memory aggregator; failures are
//! read from the database.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use pqa_db::repositories::DashboardRepo;

use crate::error::AppResult;
use crate::query::{clamp_limit, LimitParams, TrendParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/dashboard/summary
pub async fn summary(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let summary = state.trends.write().await.summary(Utc::now());
    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/dashboard/trends?days=N
///
/// Daily buckets, oldest first. `days` defaults to the whole window and is
/// clamped to it.
pub async fn trends(
    State(state): State<AppState>,
    Query(params): Query<TrendParams>,
) -> AppResult<impl IntoResponse> {
    let mut trends = state.trends.write().await;
    let days = params.days.unwrap_or_else(|| trends.window_days());
    let series = trends.series(days, Utc::now());
    Ok(Json(DataResponse { data: series }))
}

/// GET /api/v1/dashboard/failures?limit=N
pub async fn failures(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> AppResult<impl IntoResponse> {
    let failures = DashboardRepo::recent_failures(
        &state.pool,
        clamp_limit(params.limit),
        state.pipeline.top_findings as i64,
    )
    .await?;
    Ok(Json(DataResponse { data: failures }))
}
