//! Repository for the `thresholds` table.

use pqa_core::types::DbId;
use sqlx::PgPool;

use crate::models::threshold::{CreateThreshold, Threshold, UpdateThreshold};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, min_overall_score, max_data_loss_percentage, \
     auto_ticket_on_fail, active, created_at, updated_at";

/// Provides CRUD operations for quality thresholds.
pub struct ThresholdRepo;

impl ThresholdRepo {
    /// Every configured threshold, active or not.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Threshold>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM thresholds ORDER BY name");
        sqlx::query_as::<_, Threshold>(&query).fetch_all(pool).await
    }

    /// The active threshold set, read in a single statement so a run sees
    /// one consistent snapshot.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Threshold>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM thresholds WHERE active ORDER BY name");
        sqlx::query_as::<_, Threshold>(&query).fetch_all(pool).await
    }

    /// Find a threshold by id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Threshold>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM thresholds WHERE id = $1");
        sqlx::query_as::<_, Threshold>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Create a threshold, or replace the values of the one with the same name.
    pub async fn upsert(pool: &PgPool, body: &CreateThreshold) -> Result<Threshold, sqlx::Error> {
        let query = format!(
            "INSERT INTO thresholds \
                (name, min_overall_score, max_data_loss_percentage, auto_ticket_on_fail, active) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (name) DO UPDATE SET \
                min_overall_score = EXCLUDED.min_overall_score, \
                max_data_loss_percentage = EXCLUDED.max_data_loss_percentage, \
                auto_ticket_on_fail = EXCLUDED.auto_ticket_on_fail, \
                active = EXCLUDED.active, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Threshold>(&query)
            .bind(&body.name)
            .bind(body.min_overall_score)
            .bind(body.max_data_loss_percentage)
            .bind(body.auto_ticket_on_fail.unwrap_or(false))
            .bind(body.active.unwrap_or(true))
            .fetch_one(pool)
            .await
    }

    /// Patch an existing threshold. Returns `None` if the id does not exist.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        body: &UpdateThreshold,
    ) -> Result<Option<Threshold>, sqlx::Error> {
        let query = format!(
            "UPDATE thresholds SET \
                min_overall_score        = COALESCE($2, min_overall_score), \
                max_data_loss_percentage = COALESCE($3, max_data_loss_percentage), \
                auto_ticket_on_fail      = COALESCE($4, auto_ticket_on_fail), \
                active                   = COALESCE($5, active), \
                updated_at               = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Threshold>(&query)
            .bind(id)
            .bind(body.min_overall_score)
            .bind(body.max_data_loss_percentage)
            .bind(body.auto_ticket_on_fail)
            .bind(body.active)
            .fetch_optional(pool)
            .await
    }
}
