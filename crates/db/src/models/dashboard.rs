//! Read models for the dashboard queries.

use pqa_core::quality_gate::RunStatus;
use pqa_core::trends::TrendSample;
use pqa_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Minimal projection of a run used to seed the trend aggregator.
#[derive(Debug, Clone, FromRow)]
pub struct TrendSampleRow {
    pub created_at: Timestamp,
    pub status: String,
    pub overall_score: Option<f64>,
}

impl TrendSampleRow {
    /// Convert to the aggregator's sample type. Rows with an unknown status
    /// are skipped.
    pub fn to_sample(&self) -> Option<TrendSample> {
        let status = RunStatus::from_name(&self.status).ok()?;
        Some(TrendSample {
            recorded_at: self.created_at,
            status,
            overall_score: self.overall_score,
        })
    }
}

/// A recent failing run with its most severe findings.
#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub run_id: Uuid,
    pub device_id: DbId,
    pub file_type: String,
    pub overall_score: Option<f64>,
    pub data_loss_percentage: Option<f64>,
    pub critical_data_loss: bool,
    pub created_at: Timestamp,
    pub top_findings: Vec<FailureFinding>,
}

/// Finding projection embedded in [`FailureSummary`].
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FailureFinding {
    #[serde(skip)]
    pub run_id: Uuid,
    pub location: String,
    pub severity: String,
    pub change_kind: String,
    pub description: String,
}
