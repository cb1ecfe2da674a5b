//! Repository for the `analysis_runs` table.

use pqa_core::types::DbId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::analysis_run::{AnalysisRun, NewAnalysisRun};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, device_id, file_type, archived_file_id, overall_score, \
     structural_score, data_loss_percentage, critical_data_loss, reduced_confidence, \
     status, cosmetic_count, minor_count, major_count, critical_count, \
     threshold_results, error_kind, error_message, created_at";

/// Append-only access to analysis runs.
pub struct AnalysisRunRepo;

impl AnalysisRunRepo {
    /// Commit a run and all of its findings in one transaction.
    ///
    /// Either the run and every finding become visible together or nothing
    /// does.
    pub async fn create_with_findings(
        pool: &PgPool,
        input: &NewAnalysisRun,
    ) -> Result<AnalysisRun, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO analysis_runs \
                (id, device_id, file_type, archived_file_id, overall_score, structural_score, \
                 data_loss_percentage, critical_data_loss, reduced_confidence, status, \
                 cosmetic_count, minor_count, major_count, critical_count, \
                 threshold_results, error_kind, error_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {COLUMNS}"
        );
        let run = sqlx::query_as::<_, AnalysisRun>(&query)
            .bind(input.id)
            .bind(input.device_id)
            .bind(&input.file_type)
            .bind(input.archived_file_id)
            .bind(input.overall_score)
            .bind(input.structural_score)
            .bind(input.data_loss_percentage)
            .bind(input.critical_data_loss)
            .bind(input.reduced_confidence)
            .bind(&input.status)
            .bind(input.cosmetic_count)
            .bind(input.minor_count)
            .bind(input.major_count)
            .bind(input.critical_count)
            .bind(&input.threshold_results)
            .bind(&input.error_kind)
            .bind(&input.error_message)
            .fetch_one(&mut *tx)
            .await?;

        for (ordinal, finding) in input.findings.iter().enumerate() {
            sqlx::query(
                "INSERT INTO diff_findings \
                    (run_id, ordinal, location, severity, change_kind, description, \
                     original_value, reconstructed_value) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(run.id)
            .bind(ordinal as i32)
            .bind(&finding.location)
            .bind(finding.severity.as_str())
            .bind(finding.status.as_str())
            .bind(&finding.description)
            .bind(&finding.original_value)
            .bind(&finding.reconstructed_value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(run)
    }

    /// Find a run by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<AnalysisRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM analysis_runs WHERE id = $1");
        sqlx::query_as::<_, AnalysisRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Run history for a device, newest first, optionally narrowed to one
    /// file type.
    pub async fn list_for_device(
        pool: &PgPool,
        device_id: DbId,
        file_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<AnalysisRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM analysis_runs \
             WHERE device_id = $1 AND ($2::TEXT IS NULL OR file_type = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3"
        );
        sqlx::query_as::<_, AnalysisRun>(&query)
            .bind(device_id)
            .bind(file_type)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Most recent failing runs, newest first.
    pub async fn recent_failures(pool: &PgPool, limit: i64) -> Result<Vec<AnalysisRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM analysis_runs \
             WHERE status = 'fail' \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1"
        );
        sqlx::query_as::<_, AnalysisRun>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
