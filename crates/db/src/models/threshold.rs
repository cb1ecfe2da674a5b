//! Threshold models and DTOs (`thresholds` table).

use pqa_core::quality_gate::ThresholdPolicy;
use pqa_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `thresholds` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Threshold {
    pub id: DbId,
    pub name: String,
    pub min_overall_score: f64,
    pub max_data_loss_percentage: f64,
    pub auto_ticket_on_fail: bool,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Threshold {
    /// The part of the record the evaluator needs.
    pub fn to_policy(&self) -> ThresholdPolicy {
        ThresholdPolicy {
            name: self.name.clone(),
            min_overall_score: self.min_overall_score,
            max_data_loss_percentage: self.max_data_loss_percentage,
            auto_ticket_on_fail: self.auto_ticket_on_fail,
        }
    }
}

// ---------------------------------------------------------------------------
// Create / Update DTOs
// ---------------------------------------------------------------------------

/// DTO for creating (or upserting by name) a threshold.
#[derive(Debug, Deserialize)]
pub struct CreateThreshold {
    pub name: String,
    pub min_overall_score: f64,
    pub max_data_loss_percentage: f64,
    pub auto_ticket_on_fail: Option<bool>,
    pub active: Option<bool>,
}

/// DTO for patching an existing threshold.
#[derive(Debug, Deserialize)]
pub struct UpdateThreshold {
    pub min_overall_score: Option<f64>,
    pub max_data_loss_percentage: Option<f64>,
    pub auto_ticket_on_fail: Option<bool>,
    pub active: Option<bool>,
}
