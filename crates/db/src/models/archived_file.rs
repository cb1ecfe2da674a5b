//! Archived original file models (`archived_files` table).

use pqa_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `archived_files` table. Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArchivedFile {
    pub id: DbId,
    pub device_id: DbId,
    pub file_type: String,
    pub content_hash: String,
    pub size_bytes: i64,
    pub stored_at: Timestamp,
}

/// DTO for recording an archived blob against a device/file type.
#[derive(Debug, Clone)]
pub struct CreateArchivedFile {
    pub device_id: DbId,
    pub file_type: String,
    pub content_hash: String,
    pub size_bytes: i64,
}

/// A distinct analysis target discovered from the archive (used by sweeps).
#[derive(Debug, Clone, FromRow)]
pub struct ArchiveTarget {
    pub device_id: DbId,
    pub file_type: String,
}
