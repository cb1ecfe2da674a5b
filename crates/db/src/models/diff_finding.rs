//! Diff finding models (`diff_findings` table).

use pqa_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `diff_findings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DiffFinding {
    pub id: DbId,
    pub run_id: Uuid,
    pub ordinal: i32,
    pub location: String,
    pub severity: String,
    pub change_kind: String,
    pub description: String,
    pub original_value: Option<String>,
    pub reconstructed_value: Option<String>,
}
