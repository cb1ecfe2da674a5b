//! Run recording and remediation.
//!
//! [`RunRecorder`] evaluates a scored analysis against the active threshold
//! snapshot, commits the run with its findings in one transaction, and
//! hands ticketable failures to the [`RemediationDispatcher`]. Error runs
//! are committed unscored and announced as operational alerts.

use std::sync::Arc;
use std::time::Duration;

use pqa_core::analysis_status::{AnalysisKey, RunErrorKind};
use pqa_core::diff::Finding;
use pqa_core::quality_gate::{
    default_threshold, evaluate_run, require_active, RunStatus, ThresholdEvaluation,
    ThresholdPolicy, DEFAULT_THRESHOLD_NAME,
};
use pqa_core::remediation::{build_ticket_payload, thresholds_to_remediate};
use pqa_core::scoring::QualityScores;
use pqa_core::trends::TrendSample;
use pqa_core::types::DbId;
use pqa_db::models::analysis_run::{AnalysisRun, NewAnalysisRun};
use pqa_db::models::remediation::ClaimRemediation;
use pqa_db::models::threshold::Threshold;
use pqa_db::repositories::{AnalysisRunRepo, RemediationRepo, ThresholdRepo};
use pqa_events::bus::{
    ANALYSIS_COMPLETED, ANALYSIS_ERRORED, REMEDIATION_DISPATCHED, REMEDIATION_FAILED,
};
use pqa_events::{dispatch_with_retry, EventBus, PqaEvent, TicketService};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::analyzer::DiffReport;

/// Outcome of the compute phase, ready to be committed.
#[derive(Debug, Clone)]
pub enum Computed {
    Scored {
        archived_file_id: DbId,
        report: DiffReport,
    },
    Failed {
        archived_file_id: Option<DbId>,
        kind: RunErrorKind,
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cannot serialize threshold snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// A committed run plus the ticket dispatches it started.
pub struct Recorded {
    pub run: AnalysisRun,
    pub dispatches: Vec<JoinHandle<()>>,
}

/// The trend sample for a committed run.
pub fn trend_sample(run: &AnalysisRun) -> Option<TrendSample> {
    let status = RunStatus::from_name(&run.status).ok()?;
    Some(TrendSample {
        recorded_at: run.created_at,
        status,
        overall_score: run.overall_score,
    })
}

// ---------------------------------------------------------------------------
// RunRecorder
// ---------------------------------------------------------------------------

pub struct RunRecorder {
    pool: PgPool,
    events: Arc<EventBus>,
    remediation: RemediationDispatcher,
}

impl RunRecorder {
    pub fn new(pool: PgPool, events: Arc<EventBus>, remediation: RemediationDispatcher) -> Self {
        Self {
            pool,
            events,
            remediation,
        }
    }

    /// Commit the run. Remediation runs after the commit and never affects
    /// the stored run.
    pub async fn record(
        &self,
        run_id: Uuid,
        key: AnalysisKey,
        computed: Computed,
    ) -> Result<Recorded, RecordError> {
        match computed {
            Computed::Scored {
                archived_file_id,
                report,
            } => self.record_scored(run_id, key, archived_file_id, report).await,
            Computed::Failed {
                archived_file_id,
                kind,
                message,
            } => {
                let run = self
                    .record_error(run_id, key, archived_file_id, kind, message)
                    .await?;
                Ok(Recorded {
                    run,
                    dispatches: Vec::new(),
                })
            }
        }
    }

    /// The active threshold set as one snapshot, or the permissive default.
    async fn threshold_snapshot(&self) -> Result<Vec<ThresholdPolicy>, sqlx::Error> {
        let active = ThresholdRepo::list_active(&self.pool).await?;
        let policies = active.iter().map(Threshold::to_policy).collect();
        Ok(require_active(policies).unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                fallback = DEFAULT_THRESHOLD_NAME,
                "No active threshold, evaluating against the default",
            );
            vec![default_threshold()]
        }))
    }

    async fn record_scored(
        &self,
        run_id: Uuid,
        key: AnalysisKey,
        archived_file_id: DbId,
        report: DiffReport,
    ) -> Result<Recorded, RecordError> {
        let policies = self.threshold_snapshot().await?;
        let evaluation = evaluate_run(&report.scores, &policies);
        let scores = report.scores;
        let counts = report.outcome.counts;

        let input = NewAnalysisRun {
            id: run_id,
            device_id: key.device_id,
            file_type: key.file_type.as_str().to_string(),
            archived_file_id: Some(archived_file_id),
            overall_score: Some(scores.overall_score),
            structural_score: Some(scores.structural_score),
            data_loss_percentage: Some(scores.data_loss_percentage),
            critical_data_loss: scores.critical_data_loss,
            reduced_confidence: report.outcome.reduced_confidence,
            status: evaluation.status.as_str().to_string(),
            cosmetic_count: counts.cosmetic as i32,
            minor_count: counts.minor as i32,
            major_count: counts.major as i32,
            critical_count: counts.critical as i32,
            threshold_results: serde_json::to_value(&evaluation.evaluations)?,
            error_kind: None,
            error_message: None,
            findings: report.outcome.findings,
        };
        let run = AnalysisRunRepo::create_with_findings(&self.pool, &input).await?;

        match evaluation.status {
            RunStatus::Fail => tracing::warn!(
                %run_id,
                device_id = key.device_id,
                file_type = %key.file_type,
                overall_score = scores.overall_score,
                data_loss_percentage = scores.data_loss_percentage,
                critical_data_loss = scores.critical_data_loss,
                "Analysis failed quality thresholds",
            ),
            _ => tracing::info!(
                %run_id,
                device_id = key.device_id,
                file_type = %key.file_type,
                overall_score = scores.overall_score,
                "Analysis passed",
            ),
        }

        self.publish(ANALYSIS_COMPLETED, key, &run, serde_json::Value::Null);

        let mut dispatches = Vec::new();
        for failed in thresholds_to_remediate(evaluation.status, &evaluation.evaluations) {
            if let Some(handle) = self
                .remediation
                .trigger(run_id, key, &scores, failed, &input.findings)
                .await
            {
                dispatches.push(handle);
            }
        }

        Ok(Recorded { run, dispatches })
    }

    async fn record_error(
        &self,
        run_id: Uuid,
        key: AnalysisKey,
        archived_file_id: Option<DbId>,
        kind: RunErrorKind,
        message: String,
    ) -> Result<AnalysisRun, RecordError> {
        let input = NewAnalysisRun {
            id: run_id,
            device_id: key.device_id,
            file_type: key.file_type.as_str().to_string(),
            archived_file_id,
            overall_score: None,
            structural_score: None,
            data_loss_percentage: None,
            critical_data_loss: false,
            reduced_confidence: false,
            status: RunStatus::Error.as_str().to_string(),
            cosmetic_count: 0,
            minor_count: 0,
            major_count: 0,
            critical_count: 0,
            threshold_results: serde_json::Value::Array(Vec::new()),
            error_kind: Some(kind.as_str().to_string()),
            error_message: Some(message.clone()),
            findings: Vec::new(),
        };
        let run = AnalysisRunRepo::create_with_findings(&self.pool, &input).await?;

        tracing::error!(
            %run_id,
            device_id = key.device_id,
            file_type = %key.file_type,
            error_kind = %kind,
            error = %message,
            "Analysis recorded with error status",
        );
        self.publish(
            ANALYSIS_ERRORED,
            key,
            &run,
            serde_json::json!({ "error_kind": kind, "error_message": message }),
        );
        Ok(run)
    }

    fn publish(&self, event_type: &str, key: AnalysisKey, run: &AnalysisRun, extra: serde_json::Value) {
        let payload = serde_json::json!({
            "sample": trend_sample(run),
            "status": run.status,
            "overall_score": run.overall_score,
            "detail": extra,
        });
        self.events.publish(
            PqaEvent::new(event_type)
                .with_target(key.device_id, key.file_type.as_str())
                .with_run(run.id)
                .with_payload(payload),
        );
    }
}

// ---------------------------------------------------------------------------
// RemediationDispatcher
// ---------------------------------------------------------------------------

/// Opens tickets for failed thresholds, at most one per
/// device/file type/threshold inside the cool-down window.
#[derive(Clone)]
pub struct RemediationDispatcher {
    pool: PgPool,
    events: Arc<EventBus>,
    tickets: Arc<dyn TicketService>,
    cooldown: Duration,
    top_findings: usize,
    retry_delays: Vec<Duration>,
}

impl RemediationDispatcher {
    pub fn new(
        pool: PgPool,
        events: Arc<EventBus>,
        tickets: Arc<dyn TicketService>,
        cooldown: Duration,
        top_findings: usize,
        retry_delays: Vec<Duration>,
    ) -> Self {
        Self {
            pool,
            events,
            tickets,
            cooldown,
            top_findings,
            retry_delays,
        }
    }

    /// Claim the cool-down slot and, if granted, start the dispatch in the
    /// background. Returns `None` when suppressed or when the claim failed.
    pub async fn trigger(
        &self,
        run_id: Uuid,
        key: AnalysisKey,
        scores: &QualityScores,
        evaluation: &ThresholdEvaluation,
        findings: &[Finding],
    ) -> Option<JoinHandle<()>> {
        let claim = ClaimRemediation {
            run_id,
            device_id: key.device_id,
            file_type: key.file_type.as_str().to_string(),
            threshold_name: evaluation.threshold_name.clone(),
            cooldown_secs: self.cooldown.as_secs() as i64,
        };
        let record = match RemediationRepo::claim(&self.pool, &claim).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::info!(
                    %run_id,
                    device_id = key.device_id,
                    file_type = %key.file_type,
                    threshold = %evaluation.threshold_name,
                    "Ticket suppressed by cool-down",
                );
                return None;
            }
            Err(e) => {
                tracing::error!(
                    %run_id,
                    threshold = %evaluation.threshold_name,
                    error = %e,
                    "Remediation claim failed",
                );
                return None;
            }
        };

        let payload = build_ticket_payload(
            run_id,
            key.device_id,
            key.file_type,
            scores,
            evaluation,
            findings,
            self.top_findings,
        );
        let this = self.clone();
        Some(tokio::spawn(async move {
            let report =
                dispatch_with_retry(this.tickets.as_ref(), &payload, &this.retry_delays).await;
            let attempts = report.attempts as i32;
            let event = match report.outcome {
                Ok(ticket_ref) => {
                    let stored =
                        RemediationRepo::mark_dispatched(&this.pool, record.id, &ticket_ref, attempts)
                            .await;
                    if let Err(e) = stored {
                        tracing::error!(record_id = record.id, error = %e, "Failed to store ticket reference");
                    }
                    tracing::info!(
                        %run_id,
                        threshold = %payload.threshold_name,
                        %ticket_ref,
                        attempts,
                        "Ticket opened",
                    );
                    PqaEvent::new(REMEDIATION_DISPATCHED).with_payload(serde_json::json!({
                        "ticket_ref": ticket_ref,
                        "threshold": payload.threshold_name,
                    }))
                }
                Err(e) => {
                    let message = e.to_string();
                    let stored =
                        RemediationRepo::mark_failed(&this.pool, record.id, &message, attempts).await;
                    if let Err(e) = stored {
                        tracing::error!(record_id = record.id, error = %e, "Failed to store dispatch failure");
                    }
                    PqaEvent::new(REMEDIATION_FAILED).with_payload(serde_json::json!({
                        "error": message,
                        "threshold": payload.threshold_name,
                    }))
                }
            };
            this.events.publish(
                event
                    .with_target(key.device_id, key.file_type.as_str())
                    .with_run(run_id),
            );
        }))
    }
}
