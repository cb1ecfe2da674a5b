//! Route definitions for the quality dashboard.

use axum::routing::get;
use axum::Router;

use crate::handlers::dashboard;
use crate::state::AppState;

/// Dashboard routes mounted at `/dashboard`.
///
/// ```text
/// GET  /summary    -> summary
/// GET  /trends     -> trends
/// GET  /failures   -> failures
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(dashboard::summary))
        .route("/trends", get(dashboard::trends))
        .route("/failures", get(dashboard::failures))
}
