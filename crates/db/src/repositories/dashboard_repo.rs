//! Dashboard read queries over `analysis_runs` and `diff_findings`.

use std::collections::HashMap;

use pqa_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::dashboard::{FailureFinding, FailureSummary, TrendSampleRow};
use crate::repositories::{AnalysisRunRepo, DiffFindingRepo};

/// Aggregate queries backing the dashboard.
pub struct DashboardRepo;

impl DashboardRepo {
    /// Every run recorded since `since`, oldest first. Used to seed the
    /// in-memory trend aggregator at startup.
    pub async fn samples_since(
        pool: &PgPool,
        since: Timestamp,
    ) -> Result<Vec<TrendSampleRow>, sqlx::Error> {
        sqlx::query_as::<_, TrendSampleRow>(
            "SELECT created_at, status, overall_score FROM analysis_runs \
             WHERE created_at >= $1 \
             ORDER BY created_at, id",
        )
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Most recent failing runs with their most severe findings attached.
    pub async fn recent_failures(
        pool: &PgPool,
        limit: i64,
        findings_per_run: i64,
    ) -> Result<Vec<FailureSummary>, sqlx::Error> {
        let runs = AnalysisRunRepo::recent_failures(pool, limit).await?;
        let ids: Vec<_> = runs.iter().map(|r| r.id).collect();

        let mut by_run: HashMap<_, Vec<FailureFinding>> = HashMap::new();
        for finding in DiffFindingRepo::top_for_runs(pool, &ids, findings_per_run).await? {
            by_run.entry(finding.run_id).or_default().push(finding);
        }

        Ok(runs
            .into_iter()
            .map(|run| FailureSummary {
                top_findings: by_run.remove(&run.id).unwrap_or_default(),
                run_id: run.id,
                device_id: run.device_id,
                file_type: run.file_type,
                overall_score: run.overall_score,
                data_loss_percentage: run.data_loss_percentage,
                critical_data_loss: run.critical_data_loss,
                created_at: run.created_at,
            })
            .collect())
    }
}
