//! Analysis run models (`analysis_runs` table).
//!
//! Runs are append-only: a committed row is never updated. Re-analysis of the
//! same device/file type inserts a new row.

use pqa_core::diff::Finding;
use pqa_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `analysis_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnalysisRun {
    pub id: Uuid,
    pub device_id: DbId,
    pub file_type: String,
    pub archived_file_id: Option<DbId>,
    pub overall_score: Option<f64>,
    pub structural_score: Option<f64>,
    pub data_loss_percentage: Option<f64>,
    pub critical_data_loss: bool,
    pub reduced_confidence: bool,
    pub status: String,
    pub cosmetic_count: i32,
    pub minor_count: i32,
    pub major_count: i32,
    pub critical_count: i32,
    /// Snapshot of every threshold evaluated for this run.
    pub threshold_results: serde_json::Value,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

/// Everything needed to commit one run and its findings.
#[derive(Debug, Clone)]
pub struct NewAnalysisRun {
    pub id: Uuid,
    pub device_id: DbId,
    pub file_type: String,
    pub archived_file_id: Option<DbId>,
    pub overall_score: Option<f64>,
    pub structural_score: Option<f64>,
    pub data_loss_percentage: Option<f64>,
    pub critical_data_loss: bool,
    pub reduced_confidence: bool,
    pub status: String,
    pub cosmetic_count: i32,
    pub minor_count: i32,
    pub major_count: i32,
    pub critical_count: i32,
    pub threshold_results: serde_json::Value,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub findings: Vec<Finding>,
}
