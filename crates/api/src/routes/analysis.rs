use axum::routing::{get, post};
use axum::Router;

use crate::handlers::analysis;
use crate::state::AppState;

/// Analysis routes, merged at the `/api/v1` root.
///
/// ```text
/// POST   /analyze                       -> analyze
/// GET    /analyses/{run_id}             -> get_analysis
/// DELETE /analyses/{run_id}             -> cancel_analysis
/// GET    /analyses/{run_id}/findings    -> list_findings
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analysis::analyze))
        .route(
            "/analyses/{run_id}",
            get(analysis::get_analysis).delete(analysis::cancel_analysis),
        )
        .route("/analyses/{run_id}/findings", get(analysis::list_findings))
}
