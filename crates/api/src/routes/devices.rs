use axum::extract::DefaultBodyLimit;
use axum::routing::{get, put};
use axum::Router;

use crate::handlers::{analysis, archive};
use crate::state::AppState;

/// Largest accepted device file upload.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Device-scoped routes mounted at `/devices`.
///
/// ```text
/// PUT  /{device_id}/files/{file_type}   -> upload_original
/// GET  /{device_id}/analyses            -> device_history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{device_id}/files/{file_type}",
            put(archive::upload_original).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/{device_id}/analyses", get(analysis::device_history))
}
