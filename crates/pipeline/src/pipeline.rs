//! The analysis job run by the executor.
//!
//! Resolve phase: latest archived original. Compute phase: integrity
//! re-verification, reconstruction, diff, scores. Commit phase: threshold snapshot, run and
//! findings, remediation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pqa_core::analysis_status::{AnalysisKey, RunErrorKind};
use pqa_core::quality_gate::RunStatus;
use pqa_db::models::archived_file::ArchivedFile;
use pqa_db::repositories::ArchivedFileRepo;
use pqa_events::bus::ARCHIVE_INTEGRITY_FAILED;
use pqa_events::{EventBus, PqaEvent};
use sqlx::PgPool;
use uuid::Uuid;

use crate::analyzer::Analyzer;
use crate::archive::{ArchiveError, ArchiveStore};
use crate::executor::{AnalysisExecutor, AnalysisJob};
use crate::recorder::{Computed, RecordError, RunRecorder};

/// Executor specialised to the analysis pipeline.
pub type PipelineExecutor = AnalysisExecutor<AnalysisPipeline>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

pub struct AnalysisPipeline {
    pool: PgPool,
    archive: ArchiveStore,
    analyzer: Analyzer,
    recorder: RunRecorder,
    events: Arc<EventBus>,
}

impl AnalysisPipeline {
    pub fn new(
        pool: PgPool,
        archive: ArchiveStore,
        analyzer: Analyzer,
        recorder: RunRecorder,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            pool,
            archive,
            analyzer,
            recorder,
            events,
        }
    }

    pub fn recorder(&self) -> &RunRecorder {
        &self.recorder
    }
}

#[async_trait]
impl AnalysisJob for AnalysisPipeline {
    type Target = Option<ArchivedFile>;
    type Computed = Computed;
    type Error = PipelineError;

    async fn resolve(
        &self,
        _run_id: Uuid,
        key: AnalysisKey,
    ) -> Result<Option<ArchivedFile>, PipelineError> {
        Ok(ArchivedFileRepo::latest_for(&self.pool, key.device_id, key.file_type.as_str()).await?)
    }

    async fn compute(
        &self,
        run_id: Uuid,
        key: AnalysisKey,
        target: &Option<ArchivedFile>,
    ) -> Result<Computed, PipelineError> {
        let Some(archived) = target else {
            return Ok(Computed::Failed {
                archived_file_id: None,
                kind: RunErrorKind::MissingArchive,
                message: format!("No archived original for {key}"),
            });
        };

        let original = match self.archive.verify(&archived.content_hash).await {
            Ok(bytes) => bytes,
            Err(e @ (ArchiveError::Integrity { .. } | ArchiveError::NotFound(_))) => {
                tracing::error!(
                    %run_id,
                    device_id = key.device_id,
                    file_type = %key.file_type,
                    content_hash = %archived.content_hash,
                    error = %e,
                    "Archived original failed verification",
                );
                self.events.publish(
                    PqaEvent::new(ARCHIVE_INTEGRITY_FAILED)
                        .with_target(key.device_id, key.file_type.as_str())
                        .with_run(run_id)
                        .with_payload(serde_json::json!({
                            "archived_file_id": archived.id,
                            "content_hash": archived.content_hash,
                            "error": e.to_string(),
                        })),
                );
                return Ok(Computed::Failed {
                    archived_file_id: Some(archived.id),
                    kind: RunErrorKind::ArchiveIntegrity,
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        match self
            .analyzer
            .analyze(key.device_id, key.file_type, &original)
            .await
        {
            Ok(report) => Ok(Computed::Scored {
                archived_file_id: archived.id,
                report,
            }),
            Err(e) => Ok(Computed::Failed {
                archived_file_id: Some(archived.id),
                kind: RunErrorKind::Reconstruction,
                message: e.to_string(),
            }),
        }
    }

    fn timed_out(
        &self,
        key: AnalysisKey,
        target: &Option<ArchivedFile>,
        budget: Duration,
    ) -> Computed {
        Computed::Failed {
            archived_file_id: target.as_ref().map(|archived| archived.id),
            kind: RunErrorKind::Timeout,
            message: format!(
                "Analysis of {key} exceeded its {}s time budget",
                budget.as_secs()
            ),
        }
    }

    async fn commit(
        &self,
        run_id: Uuid,
        key: AnalysisKey,
        computed: Computed,
    ) -> Result<RunStatus, PipelineError> {
        let recorded = self.recorder.record(run_id, key, computed).await?;
        Ok(RunStatus::from_name(&recorded.run.status).unwrap_or(RunStatus::Error))
    }
}
