//! Repository for the `diff_findings` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::dashboard::FailureFinding;
use crate::models::diff_finding::DiffFinding;

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, run_id, ordinal, location, severity, change_kind, \
     description, original_value, reconstructed_value";

/// Read access to findings. Inserts happen inside
/// [`AnalysisRunRepo::create_with_findings`](super::AnalysisRunRepo::create_with_findings).
pub struct DiffFindingRepo;

impl DiffFindingRepo {
    /// All findings of a run in analyzer order.
    pub async fn list_for_run(pool: &PgPool, run_id: Uuid) -> Result<Vec<DiffFinding>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM diff_findings WHERE run_id = $1 ORDER BY ordinal"
        );
        sqlx::query_as::<_, DiffFinding>(&query)
            .bind(run_id)
            .fetch_all(pool)
            .await
    }

    /// The `per_run` most severe findings of each given run.
    pub async fn top_for_runs(
        pool: &PgPool,
        run_ids: &[Uuid],
        per_run: i64,
    ) -> Result<Vec<FailureFinding>, sqlx::Error> {
        if run_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, FailureFinding>(
            "SELECT run_id, location, severity, change_kind, description FROM ( \
                SELECT run_id, location, severity, change_kind, description, \
                       ROW_NUMBER() OVER ( \
                           PARTITION BY run_id \
                           ORDER BY CASE severity \
                               WHEN 'critical' THEN 0 \
                               WHEN 'major' THEN 1 \
                               WHEN 'minor' THEN 2 \
                               ELSE 3 END, ordinal \
                       ) AS rank \
                FROM diff_findings WHERE run_id = ANY($1) \
             ) ranked \
             WHERE rank <= $2 \
             ORDER BY run_id, rank",
        )
        .bind(run_ids)
        .bind(per_run)
        .fetch_all(pool)
        .await
    }
}
