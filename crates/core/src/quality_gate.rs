//! Threshold policy, validation, and pass/fail evaluation.
//!
//! A run passes a threshold iff `overall_score >= min_overall_score`,
//! `data_loss_percentage <= max_data_loss_percentage`, and there is no
//! critical data loss. A run's status is `fail` if any active threshold
//! fails and `pass` only if all pass. Tightening a threshold can only move a
//! verdict from pass to fail.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::scoring::QualityScores;

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

/// Terminal status of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pass,
    Fail,
    /// Reconstruction, archive, or timeout failure; no scores were computed.
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            "error" => Ok(Self::Error),
            other => Err(CoreError::Validation(format!("Unknown run status '{other}'"))),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Threshold policy
// ---------------------------------------------------------------------------

/// The evaluation-relevant part of a threshold record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    pub name: String,
    pub min_overall_score: f64,
    pub max_data_loss_percentage: f64,
    pub auto_ticket_on_fail: bool,
}

/// Name of the shipped fallback threshold.
pub const DEFAULT_THRESHOLD_NAME: &str = "default";

/// Minimum overall score of the fallback threshold.
pub const DEFAULT_MIN_OVERALL_SCORE: f64 = 80.0;

/// Maximum data loss of the fallback threshold.
pub const DEFAULT_MAX_DATA_LOSS_PERCENTAGE: f64 = 20.0;

/// The permissive threshold used when no threshold is active.
///
/// Matches the `default` row seeded by the initial migration. It never opens
/// tickets; critical data loss still fails the run.
pub fn default_threshold() -> ThresholdPolicy {
    ThresholdPolicy {
        name: DEFAULT_THRESHOLD_NAME.to_string(),
        min_overall_score: DEFAULT_MIN_OVERALL_SCORE,
        max_data_loss_percentage: DEFAULT_MAX_DATA_LOSS_PERCENTAGE,
        auto_ticket_on_fail: false,
    }
}

/// Raised when no threshold is active at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No active threshold configured")]
pub struct ThresholdConfigError;

/// Return the active thresholds, or an error when there are none.
///
/// Callers handle the error by logging a warning and evaluating against
/// [`default_threshold`]; evaluation is never skipped.
pub fn require_active(
    active: Vec<ThresholdPolicy>,
) -> Result<Vec<ThresholdPolicy>, ThresholdConfigError> {
    if active.is_empty() {
        Err(ThresholdConfigError)
    } else {
        Ok(active)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Maximum length of a threshold name.
const MAX_NAME_LEN: usize = 64;

/// Validate a threshold name: non-empty, bounded, `[a-z0-9_-]`.
pub fn validate_threshold_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "Threshold name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Threshold name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(CoreError::Validation(
            "Threshold name may only contain lowercase letters, digits, hyphen, or underscore"
                .to_string(),
        ));
    }
    Ok(())
}

/// Validate threshold values: both percentages in `[0, 100]`.
pub fn validate_threshold(
    min_overall_score: f64,
    max_data_loss_percentage: f64,
) -> Result<(), CoreError> {
    if !(0.0..=100.0).contains(&min_overall_score) {
        return Err(CoreError::Validation(format!(
            "min_overall_score must be between 0 and 100, got {min_overall_score}"
        )));
    }
    if !(0.0..=100.0).contains(&max_data_loss_percentage) {
        return Err(CoreError::Validation(format!(
            "max_data_loss_percentage must be between 0 and 100, got {max_data_loss_percentage}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Verdict of one threshold against one run, stored with the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEvaluation {
    pub threshold_name: String,
    pub min_overall_score: f64,
    pub max_data_loss_percentage: f64,
    pub auto_ticket_on_fail: bool,
    pub passed: bool,
    /// Human-readable reasons for a failure; empty when passed.
    pub violations: Vec<String>,
}

/// Evaluate scores against a single threshold.
pub fn evaluate_threshold(scores: &QualityScores, policy: &ThresholdPolicy) -> ThresholdEvaluation {
    let mut violations = Vec::new();
    if scores.overall_score < policy.min_overall_score {
        violations.push(format!(
            "overall_score {} is below {}",
            scores.overall_score, policy.min_overall_score
        ));
    }
    if scores.data_loss_percentage > policy.max_data_loss_percentage {
        violations.push(format!(
            "data_loss_percentage {} exceeds {}",
            scores.data_loss_percentage, policy.max_data_loss_percentage
        ));
    }
    if scores.critical_data_loss {
        violations.push("critical data loss".to_string());
    }

    ThresholdEvaluation {
        threshold_name: policy.name.clone(),
        min_overall_score: policy.min_overall_score,
        max_data_loss_percentage: policy.max_data_loss_percentage,
        auto_ticket_on_fail: policy.auto_ticket_on_fail,
        passed: violations.is_empty(),
        violations,
    }
}

/// Status plus per-threshold verdicts for a scored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvaluation {
    pub status: RunStatus,
    pub evaluations: Vec<ThresholdEvaluation>,
}

impl RunEvaluation {
    /// Failed thresholds that request an automatic ticket.
    pub fn ticketable_failures(&self) -> impl Iterator<Item = &ThresholdEvaluation> {
        self.evaluations
            .iter()
            .filter(|e| !e.passed && e.auto_ticket_on_fail)
    }
}

/// Evaluate a scored run against every policy independently.
///
/// Critical data loss always fails the run, even against an empty policy set.
pub fn evaluate_run(scores: &QualityScores, policies: &[ThresholdPolicy]) -> RunEvaluation {
    let evaluations: Vec<_> = policies
        .iter()
        .map(|p| evaluate_threshold(scores, p))
        .collect();
    let all_passed = evaluations.iter().all(|e| e.passed);
    let status = if all_passed && !scores.critical_data_loss {
        RunStatus::Pass
    } else {
        RunStatus::Fail
    };
    RunEvaluation {
        status,
        evaluations,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
