//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod analysis_run_repo;
pub mod archived_file_repo;
pub mod dashboard_repo;
pub mod diff_finding_repo;
pub mod remediation_repo;
pub mod threshold_repo;

pub use analysis_run_repo::AnalysisRunRepo;
pub use archived_file_repo::ArchivedFileRepo;
pub use dashboard_repo::DashboardRepo;
pub use diff_finding_repo::DiffFindingRepo;
pub use remediation_repo::RemediationRepo;
pub use threshold_repo::ThresholdRepo;
