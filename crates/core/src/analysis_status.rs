//! Job-status model for analyses.
//!
//! `analyze` hands back a run id immediately; the run then moves through
//! `queued -> running -> pass | fail | error`, or to `cancelled` if its
//! request is withdrawn before anything was committed.

use serde::{Deserialize, Serialize};

use crate::file_type::FileType;
use crate::quality_gate::RunStatus;
use crate::types::DbId;

/// Identity of an analysis target; concurrent requests for the same key
/// share one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisKey {
    pub device_id: DbId,
    pub file_type: FileType,
}

impl AnalysisKey {
    pub fn new(device_id: DbId, file_type: FileType) -> Self {
        Self {
            device_id,
            file_type,
        }
    }
}

impl std::fmt::Display for AnalysisKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device_id, self.file_type)
    }
}

/// Why a run ended with `status = error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    /// No original was archived for the device/file type.
    MissingArchive,
    /// The archived bytes no longer match their content hash.
    ArchiveIntegrity,
    /// The reconstruction collaborator failed.
    Reconstruction,
    /// The analysis exceeded its time budget.
    Timeout,
}

impl RunErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingArchive => "missing_archive",
            Self::ArchiveIntegrity => "archive_integrity",
            Self::Reconstruction => "reconstruction",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live state of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Pass,
    Fail,
    Error,
    Cancelled,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

impl From<RunStatus> for JobState {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Pass => Self::Pass,
            RunStatus::Fail => Self::Fail,
            RunStatus::Error => Self::Error,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
