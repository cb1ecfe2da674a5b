//! Quality scores derived from a [`DiffOutcome`].
//!
//! - `structural_score` = 100 x shared paths / union of paths
//! - `data_loss_percentage` = 100 x data-loss findings / original leaves
//! - `overall_score` = weighted mean of `structural_score` and
//!   `100 - data_loss_percentage`, clamped to `[0, 100]`
//! - `critical_data_loss` = any critical finding
//!
//! The weights are policy, not constants; see [`ScoringWeights`].

use serde::{Deserialize, Serialize};

use crate::diff::DiffOutcome;
use crate::error::CoreError;

/// Default weight of the structural score in the overall score.
pub const DEFAULT_STRUCTURAL_WEIGHT: f64 = 0.4;

/// Default weight of data integrity (`100 - data_loss_percentage`).
pub const DEFAULT_INTEGRITY_WEIGHT: f64 = 0.6;

/// Weights combining structure and integrity into the overall score.
///
/// Weights are normalized by their sum, so `(2, 3)` behaves like `(0.4, 0.6)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub structural: f64,
    pub integrity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            structural: DEFAULT_STRUCTURAL_WEIGHT,
            integrity: DEFAULT_INTEGRITY_WEIGHT,
        }
    }
}

impl ScoringWeights {
    /// Both weights must be finite and non-negative, and not both zero.
    pub fn new(structural: f64, integrity: f64) -> Result<Self, CoreError> {
        for (name, w) in [("structural", structural), ("integrity", integrity)] {
            if !w.is_finite() || w < 0.0 {
                return Err(CoreError::Validation(format!(
                    "{name} weight must be a non-negative number, got {w}"
                )));
            }
        }
        if structural + integrity <= 0.0 {
            return Err(CoreError::Validation(
                "At least one scoring weight must be positive".to_string(),
            ));
        }
        Ok(Self {
            structural,
            integrity,
        })
    }
}

/// Computed quality metrics for one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub overall_score: f64,
    pub structural_score: f64,
    pub data_loss_percentage: f64,
    pub critical_data_loss: bool,
}

impl QualityScores {
    /// Scores of a byte-identical reconstruction.
    pub fn perfect() -> Self {
        Self {
            overall_score: 100.0,
            structural_score: 100.0,
            data_loss_percentage: 0.0,
            critical_data_loss: false,
        }
    }
}

/// Compute quality scores for a diff outcome.
pub fn compute_scores(outcome: &DiffOutcome, weights: &ScoringWeights) -> QualityScores {
    let structural_score = if outcome.union_paths == 0 {
        100.0
    } else {
        100.0 * outcome.shared_paths as f64 / outcome.union_paths as f64
    };

    let data_loss_percentage = if outcome.original_leaf_count == 0 {
        0.0
    } else {
        (100.0 * outcome.data_loss_findings() as f64 / outcome.original_leaf_count as f64)
            .min(100.0)
    };

    let total_weight = weights.structural + weights.integrity;
    let overall = (weights.structural * structural_score
        + weights.integrity * (100.0 - data_loss_percentage))
        / total_weight;

    QualityScores {
        overall_score: round2(overall.clamp(0.0, 100.0)),
        structural_score: round2(structural_score),
        data_loss_percentage: round2(data_loss_percentage),
        critical_data_loss: outcome.has_critical(),
    }
}

/// Round to two decimal places for storage and display.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
