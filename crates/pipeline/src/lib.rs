//! Analysis pipeline: archive, reconstruction, differential analysis,
//! recording, remediation, and the bounded executor that runs it all.

pub mod analyzer;
pub mod archive;
pub mod config;
pub mod executor;
pub mod pipeline;
pub mod reconstruction;
pub mod recorder;

pub use analyzer::Analyzer;
pub use archive::{ArchiveError, ArchiveStore, BlobStore, FilesystemBlobStore};
pub use config::PipelineConfig;
pub use executor::{AnalysisExecutor, AnalysisJob, ExecutorError, JobSnapshot, Submission};
pub use pipeline::{AnalysisPipeline, PipelineExecutor};
pub use reconstruction::{HttpParserService, ParserService};
pub use recorder::{RemediationDispatcher, RunRecorder};
