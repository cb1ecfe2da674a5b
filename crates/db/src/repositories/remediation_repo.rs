//! Repository for the `remediation_records` table.

use pqa_core::remediation::{DISPATCH_DISPATCHED, DISPATCH_FAILED};
use pqa_core::types::DbId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::remediation::{ClaimRemediation, RemediationRecord};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, run_id, device_id, file_type, threshold_name, ticket_ref, \
     dispatch_status, attempts, last_error, created_at, updated_at";

/// Ticket bookkeeping with cool-down de-duplication.
pub struct RemediationRepo;

impl RemediationRepo {
    /// Claim the right to open a ticket for a device/file type/threshold.
    ///
    /// Returns `None` when a non-failed record for the same target exists
    /// inside the cool-down window. Concurrent claims for one target are
    /// serialized by a transaction-scoped advisory lock, so at most one of
    /// them inserts.
    pub async fn claim(
        pool: &PgPool,
        input: &ClaimRemediation,
    ) -> Result<Option<RemediationRecord>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let lock_key = format!(
            "remediation:{}:{}:{}",
            input.device_id, input.file_type, input.threshold_name
        );
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(&lock_key)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO remediation_records (run_id, device_id, file_type, threshold_name) \
             SELECT $1, $2, $3, $4 \
             WHERE NOT EXISTS ( \
                SELECT 1 FROM remediation_records \
                WHERE device_id = $2 AND file_type = $3 AND threshold_name = $4 \
                  AND dispatch_status <> '{DISPATCH_FAILED}' \
                  AND created_at > NOW() - make_interval(secs => $5::DOUBLE PRECISION) \
             ) \
             RETURNING {COLUMNS}"
        );
        let claimed = sqlx::query_as::<_, RemediationRecord>(&query)
            .bind(input.run_id)
            .bind(input.device_id)
            .bind(&input.file_type)
            .bind(&input.threshold_name)
            .bind(input.cooldown_secs as f64)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(claimed)
    }

    /// Record a successful dispatch.
    pub async fn mark_dispatched(
        pool: &PgPool,
        id: DbId,
        ticket_ref: &str,
        attempts: i32,
    ) -> Result<Option<RemediationRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE remediation_records SET \
                dispatch_status = '{DISPATCH_DISPATCHED}', ticket_ref = $2, attempts = $3, \
                last_error = NULL, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RemediationRecord>(&query)
            .bind(id)
            .bind(ticket_ref)
            .bind(attempts)
            .fetch_optional(pool)
            .await
    }

    /// Record that every dispatch attempt failed. The record then stops
    /// holding the cool-down.
    pub async fn mark_failed(
        pool: &PgPool,
        id: DbId,
        last_error: &str,
        attempts: i32,
    ) -> Result<Option<RemediationRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE remediation_records SET \
                dispatch_status = '{DISPATCH_FAILED}', last_error = $2, attempts = $3, \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RemediationRecord>(&query)
            .bind(id)
            .bind(last_error)
            .bind(attempts)
            .fetch_optional(pool)
            .await
    }

    /// Records opened for a run.
    pub async fn list_for_run(
        pool: &PgPool,
        run_id: Uuid,
    ) -> Result<Vec<RemediationRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM remediation_records WHERE run_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, RemediationRecord>(&query)
            .bind(run_id)
            .fetch_all(pool)
            .await
    }
}
