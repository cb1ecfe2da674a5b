//! Remediation policy: which thresholds open tickets, and ticket payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diff::Finding;
use crate::file_type::FileType;
use crate::quality_gate::{RunStatus, ThresholdEvaluation};
use crate::scoring::QualityScores;
use crate::types::DbId;

/// Default cool-down between tickets for the same device/file/threshold.
pub const DEFAULT_COOLDOWN_SECS: u64 = 24 * 60 * 60;

/// Default number of findings included in a ticket payload.
pub const DEFAULT_TOP_FINDINGS: usize = 10;

/// Dispatch lifecycle of a remediation record.
pub const DISPATCH_DISPATCHED: &str = "dispatched";
pub const DISPATCH_FAILED: &str = "failed";

/// Thresholds that should open a ticket for a run.
///
/// Only `fail` runs remediate; `error` runs are operational alerts and never
/// enter the ticket stream.
pub fn thresholds_to_remediate(
    status: RunStatus,
    evaluations: &[ThresholdEvaluation],
) -> Vec<&ThresholdEvaluation> {
    if status != RunStatus::Fail {
        return Vec::new();
    }
    evaluations
        .iter()
        .filter(|e| !e.passed && e.auto_ticket_on_fail)
        .collect()
}

/// The `n` most severe findings, keeping original order among equals.
pub fn top_findings(findings: &[Finding], n: usize) -> Vec<&Finding> {
    let mut sorted: Vec<&Finding> = findings.iter().collect();
    sorted.sort_by(|a, b| b.severity.cmp(&a.severity));
    sorted.truncate(n);
    sorted
}

/// Compact finding representation sent to the ticket service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingSummary {
    pub location: String,
    pub severity: String,
    pub description: String,
}

impl From<&Finding> for FindingSummary {
    fn from(f: &Finding) -> Self {
        Self {
            location: f.location.clone(),
            severity: f.severity.as_str().to_string(),
            description: f.description.clone(),
        }
    }
}

/// Structured failure payload handed to the ticket collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPayload {
    pub run_id: Uuid,
    pub device_id: DbId,
    pub file_type: FileType,
    pub threshold_name: String,
    pub title: String,
    pub scores: QualityScores,
    pub violations: Vec<String>,
    pub top_findings: Vec<FindingSummary>,
}

/// Assemble the ticket payload for one failed threshold.
pub fn build_ticket_payload(
    run_id: Uuid,
    device_id: DbId,
    file_type: FileType,
    scores: &QualityScores,
    evaluation: &ThresholdEvaluation,
    findings: &[Finding],
    top_n: usize,
) -> TicketPayload {
    TicketPayload {
        run_id,
        device_id,
        file_type,
        threshold_name: evaluation.threshold_name.clone(),
        title: format!(
            "Parse quality below '{}' for device {device_id} ({file_type}): score {}",
            evaluation.threshold_name, scores.overall_score
        ),
        scores: *scores,
        violations: evaluation.violations.clone(),
        top_findings: top_findings(findings, top_n)
            .into_iter()
            .map(FindingSummary::from)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffStatus;
    use crate::severity::Severity;

    fn finding(location: &str, severity: Severity) -> Finding {
        Finding {
            location: location.to_string(),
            severity,
            status: DiffStatus::Removed,
            description: "Field missing from reconstruction".to_string(),
            original_value: Some("x".to_string()),
            reconstructed_value: None,
        }
    }

    fn evaluation(name: &str, passed: bool, auto_ticket: bool) -> ThresholdEvaluation {
        ThresholdEvaluation {
            threshold_name: name.to_string(),
            min_overall_score: 95.0,
            max_data_loss_percentage: 5.0,
            auto_ticket_on_fail: auto_ticket,
            passed,
            violations: if passed { vec![] } else { vec!["critical data loss".into()] },
        }
    }

    // -- thresholds_to_remediate ----------------------------------------------

    #[test]
    fn only_failed_auto_ticket_thresholds_on_fail_runs() {
        let evals = vec![
            evaluation("standard", false, true),
            evaluation("strict", false, false),
            evaluation("lenient", true, true),
        ];
        let picked = thresholds_to_remediate(RunStatus::Fail, &evals);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].threshold_name, "standard");
    }

    #[test]
    fn pass_and_error_runs_never_remediate() {
        let evals = vec![evaluation("standard", false, true)];
        assert!(thresholds_to_remediate(RunStatus::Pass, &evals).is_empty());
        assert!(thresholds_to_remediate(RunStatus::Error, &evals).is_empty());
    }

    // -- top_findings ---------------------------------------------------------

    #[test]
    fn top_findings_sorted_by_severity_then_order() {
        let findings = vec![
            finding("a", Severity::Minor),
            finding("b", Severity::Critical),
            finding("c", Severity::Major),
            finding("d", Severity::Critical),
            finding("e", Severity::Cosmetic),
        ];
        let top: Vec<_> = top_findings(&findings, 3)
            .into_iter()
            .map(|f| f.location.as_str())
            .collect();
        assert_eq!(top, vec!["b", "d", "c"]);
    }

    // -- build_ticket_payload -------------------------------------------------

    #[test]
    fn payload_carries_identity_scores_and_findings() {
        let run_id = Uuid::now_v7();
        let findings = vec![finding("DeviceInfo/VendorNumber", Severity::Critical)];
        let scores = QualityScores {
            overall_score: 98.0,
            structural_score: 98.0,
            data_loss_percentage: 2.0,
            critical_data_loss: true,
        };
        let payload = build_ticket_payload(
            run_id,
            7,
            FileType::Eds,
            &scores,
            &evaluation("standard", false, true),
            &findings,
            DEFAULT_TOP_FINDINGS,
        );
        assert_eq!(payload.run_id, run_id);
        assert_eq!(payload.device_id, 7);
        assert_eq!(payload.threshold_name, "standard");
        assert_eq!(payload.top_findings.len(), 1);
        assert_eq!(payload.top_findings[0].severity, "critical");
        assert!(payload.title.contains("device 7"));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["file_type"], "eds");
        assert_eq!(json["scores"]["critical_data_loss"], true);
    }
}
