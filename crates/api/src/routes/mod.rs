pub mod analysis;
pub mod archive;
pub mod dashboard;
pub mod devices;
pub mod health;
pub mod thresholds;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /analyze                                   submit or join an analysis (POST)
/// /analyses/{run_id}                         run or live job state, cancel
/// /analyses/{run_id}/findings                findings of a committed run
///
/// /devices/{device_id}/files/{file_type}     archive an original (PUT)
/// /devices/{device_id}/analyses              analysis history
///
/// /archive/{content_hash}/verify             re-verify a stored blob
///
/// /thresholds                                list, upsert by name
/// /thresholds/{id}                           patch
///
/// /dashboard/summary                         rolling counts and average
/// /dashboard/trends                          daily series (?days=)
/// /dashboard/failures                        recent failures (?limit=)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(analysis::router())
        .nest("/devices", devices::router())
        .nest("/archive", archive::router())
        .nest("/thresholds", thresholds::router())
        .nest("/dashboard", dashboard::router())
}
