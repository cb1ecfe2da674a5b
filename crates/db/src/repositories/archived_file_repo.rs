//! Repository for the `archived_files` table.

use pqa_core::types::DbId;
use sqlx::PgPool;

use crate::models::archived_file::{ArchiveTarget, ArchivedFile, CreateArchivedFile};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, device_id, file_type, content_hash, size_bytes, stored_at";

/// `COLUMNS` qualified for queries joining `archived_files a`.
const PREFIXED_COLUMNS: &str =
    "a.id, a.device_id, a.file_type, a.content_hash, a.size_bytes, a.stored_at";

/// Records which content-addressed blobs belong to which device/file type.
pub struct ArchivedFileRepo;

impl ArchivedFileRepo {
    /// Record an upload of an archived blob for a device/file type.
    ///
    /// The content row is idempotent on `(device_id, file_type, content_hash)`:
    /// a repeated upload reuses the existing row. Every call appends an
    /// `archive_uploads` event in the same transaction, so a re-upload makes
    /// that content current again. The boolean is `true` when a new content
    /// row was written.
    pub async fn insert(
        pool: &PgPool,
        input: &CreateArchivedFile,
    ) -> Result<(ArchivedFile, bool), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO archived_files (device_id, file_type, content_hash, size_bytes) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (device_id, file_type, content_hash) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, ArchivedFile>(&query)
            .bind(input.device_id)
            .bind(&input.file_type)
            .bind(&input.content_hash)
            .bind(input.size_bytes)
            .fetch_optional(&mut *tx)
            .await?;

        let (row, created) = match inserted {
            Some(row) => (row, true),
            None => {
                let query = format!(
                    "SELECT {COLUMNS} FROM archived_files \
                     WHERE device_id = $1 AND file_type = $2 AND content_hash = $3"
                );
                let existing = sqlx::query_as::<_, ArchivedFile>(&query)
                    .bind(input.device_id)
                    .bind(&input.file_type)
                    .bind(&input.content_hash)
                    .fetch_one(&mut *tx)
                    .await?;
                (existing, false)
            }
        };

        sqlx::query(
            "INSERT INTO archive_uploads (archived_file_id, device_id, file_type) \
             VALUES ($1, $2, $3)",
        )
        .bind(row.id)
        .bind(row.device_id)
        .bind(&row.file_type)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((row, created))
    }

    /// The archived original behind the most recent upload for a device/file
    /// type.
    pub async fn latest_for(
        pool: &PgPool,
        device_id: DbId,
        file_type: &str,
    ) -> Result<Option<ArchivedFile>, sqlx::Error> {
        let query = format!(
            "SELECT {PREFIXED_COLUMNS} FROM archive_uploads u \
             JOIN archived_files a ON a.id = u.archived_file_id \
             WHERE u.device_id = $1 AND u.file_type = $2 \
             ORDER BY u.id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, ArchivedFile>(&query)
            .bind(device_id)
            .bind(file_type)
            .fetch_optional(pool)
            .await
    }

    /// Every distinct `(device_id, file_type)` with at least one archived
    /// original. Targets never analyzed come first, then the ones whose
    /// latest run is oldest, so a sweep cut short by backpressure resumes
    /// with the targets it skipped.
    pub async fn list_targets(pool: &PgPool) -> Result<Vec<ArchiveTarget>, sqlx::Error> {
        sqlx::query_as::<_, ArchiveTarget>(
            "SELECT t.device_id, t.file_type \
             FROM (SELECT DISTINCT device_id, file_type FROM archived_files) t \
             LEFT JOIN ( \
                 SELECT device_id, file_type, MAX(created_at) AS last_run \
                 FROM analysis_runs \
                 GROUP BY device_id, file_type \
             ) r ON r.device_id = t.device_id AND r.file_type = t.file_type \
             ORDER BY r.last_run ASC NULLS FIRST, t.device_id, t.file_type",
        )
        .fetch_all(pool)
        .await
    }
}
