use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pqa_core::error::CoreError;
use pqa_pipeline::{ArchiveError, ExecutorError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors, the pipeline's archive and
/// executor errors, and adds HTTP-specific variants. Implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `pqa_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An archive store error.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The analysis executor refused or could not find a job.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- Archive errors ---
            AppError::Archive(err) => match err {
                ArchiveError::NotFound(hash) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("No archived blob for {hash}"),
                ),
                ArchiveError::InvalidHash(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                ArchiveError::Integrity { .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ARCHIVE_INTEGRITY_ERROR",
                    err.to_string(),
                ),
                ArchiveError::Database(db) => classify_sqlx_error(db),
                ArchiveError::Io(io) => {
                    tracing::error!(error = %io, "Blob storage error");
                    internal()
                }
            },

            // --- Executor errors ---
            AppError::Executor(err) => match err {
                ExecutorError::Overloaded { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "OVERLOADED", err.to_string())
                }
                ExecutorError::ShuttingDown => {
                    (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", err.to_string())
                }
                ExecutorError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                ExecutorError::AlreadyFinished { .. } => {
                    (StatusCode::CONFLICT, "CONFLICT", err.to_string())
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
