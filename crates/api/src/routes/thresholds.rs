use axum::routing::{get, patch};
use axum::Router;

use crate::handlers::thresholds;
use crate::state::AppState;

/// Threshold routes mounted at `/thresholds`.
///
/// ```text
/// GET    /        -> list_thresholds
/// POST   /        -> upsert_threshold
/// PATCH  /{id}    -> update_threshold
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(thresholds::list_thresholds).post(thresholds::upsert_threshold),
        )
        .route("/{id}", patch(thresholds::update_threshold))
}
