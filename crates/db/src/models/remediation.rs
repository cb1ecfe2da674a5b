//! Remediation record models (`remediation_records` table).

use pqa_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `remediation_records` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RemediationRecord {
    pub id: DbId,
    pub run_id: Uuid,
    pub device_id: DbId,
    pub file_type: String,
    pub threshold_name: String,
    pub ticket_ref: Option<String>,
    pub dispatch_status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for claiming a remediation slot for a failed run/threshold pair.
#[derive(Debug, Clone)]
pub struct ClaimRemediation {
    pub run_id: Uuid,
    pub device_id: DbId,
    pub file_type: String,
    pub threshold_name: String,
    pub cooldown_secs: i64,
}
