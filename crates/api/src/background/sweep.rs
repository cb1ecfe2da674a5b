//! Scheduled sweeps over every archived target.
//!
//! Sweeps submit to the same executor as on-demand requests, so they share
//! its worker pool, backpressure limit, and single-flight de-duplication.

use std::sync::Arc;
use std::time::Duration;

use pqa_core::analysis_status::AnalysisKey;
use pqa_core::file_type::FileType;
use pqa_db::repositories::ArchivedFileRepo;
use pqa_pipeline::{ExecutorError, PipelineExecutor};
use serde::Serialize;
use sqlx::PgPool;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub targets: usize,
    pub submitted: usize,
    /// Targets already being analyzed.
    pub joined: usize,
    /// Targets left for the next sweep because the executor was full.
    pub skipped: usize,
}

/// Submit every archived `(device_id, file_type)` once, least recently
/// analyzed first.
///
/// Stops submitting at the first overloaded refusal; the rest are counted
/// as skipped. Skipped targets have the oldest runs, so they lead the next
/// sweep.
pub async fn sweep_once(
    pool: &PgPool,
    executor: &Arc<PipelineExecutor>,
) -> Result<SweepReport, sqlx::Error> {
    let targets = ArchivedFileRepo::list_targets(pool).await?;
    let mut report = SweepReport {
        targets: targets.len(),
        ..SweepReport::default()
    };

    for (i, target) in targets.iter().enumerate() {
        let file_type = match FileType::from_name(&target.file_type) {
            Ok(ft) => ft,
            Err(e) => {
                tracing::warn!(device_id = target.device_id, error = %e, "Skipping archived target");
                report.skipped += 1;
                continue;
            }
        };

        match executor
            .submit(AnalysisKey::new(target.device_id, file_type))
            .await
        {
            Ok(submission) if submission.joined => report.joined += 1,
            Ok(_) => report.submitted += 1,
            Err(ExecutorError::Overloaded { limit }) => {
                report.skipped += targets.len() - i;
                tracing::warn!(limit, skipped = report.skipped, "Executor full, deferring rest of sweep");
                break;
            }
            Err(e) => {
                report.skipped += targets.len() - i;
                tracing::info!(error = %e, "Sweep stopped");
                break;
            }
        }
    }

    Ok(report)
}

/// Run a sweep every `interval` until `cancel` is triggered. The first sweep
/// happens one interval after startup.
pub async fn run(
    pool: PgPool,
    executor: Arc<PipelineExecutor>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Analysis sweep job started");

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Analysis sweep job stopping");
                break;
            }
            _ = ticker.tick() => {
                match sweep_once(&pool, &executor).await {
                    Ok(report) => tracing::info!(
                        targets = report.targets,
                        submitted = report.submitted,
                        joined = report.joined,
                        skipped = report.skipped,
                        "Analysis sweep submitted",
                    ),
                    Err(e) => tracing::error!(error = %e, "Analysis sweep failed"),
                }
            }
        }
    }
}
