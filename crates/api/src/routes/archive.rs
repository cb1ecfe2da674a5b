use axum::routing::get;
use axum::Router;

use crate::handlers::archive;
use crate::state::AppState;

/// Archive routes mounted at `/archive`.
///
/// ```text
/// GET  /{content_hash}/verify   -> verify_blob
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{content_hash}/verify", get(archive::verify_blob))
}
