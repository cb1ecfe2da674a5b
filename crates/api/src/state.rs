use std::sync::Arc;

use pqa_core::trends::TrendAggregator;
use pqa_events::{EventBus, TicketService};
use pqa_pipeline::config::ConfigError;
use pqa_pipeline::{
    AnalysisExecutor, AnalysisPipeline, Analyzer, ArchiveStore, BlobStore, ParserService,
    PipelineConfig, PipelineExecutor, RemediationDispatcher, RunRecorder,
};
use tokio::sync::RwLock;

use crate::config::ServerConfig;

/// External systems the server talks to. Production uses the filesystem
/// blob store and the HTTP clients; tests substitute fakes.
pub struct Collaborators {
    pub blobs: Arc<dyn BlobStore>,
    pub parser: Arc<dyn ParserService>,
    pub tickets: Arc<dyn TicketService>,
}

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: pqa_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub pipeline: Arc<PipelineConfig>,
    /// Content-addressed store of original device files.
    pub archive: ArchiveStore,
    /// Bounded executor shared by on-demand requests and sweeps.
    pub executor: Arc<PipelineExecutor>,
    /// Rolling dashboard statistics, fed by the trends updater.
    pub trends: Arc<RwLock<TrendAggregator>>,
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the archive, analyzer, recorder, remediation dispatcher, and
    /// executor from configuration.
    pub fn build(
        pool: pqa_db::DbPool,
        config: ServerConfig,
        pipeline: PipelineConfig,
        collaborators: Collaborators,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, ConfigError> {
        let archive = ArchiveStore::new(collaborators.blobs);

        let dispatcher = RemediationDispatcher::new(
            pool.clone(),
            Arc::clone(&event_bus),
            collaborators.tickets,
            pipeline.ticket_cooldown,
            pipeline.top_findings,
            pipeline.ticket_retry_delays.clone(),
        );
        let recorder = RunRecorder::new(pool.clone(), Arc::clone(&event_bus), dispatcher);
        let analyzer = Analyzer::new(
            collaborators.parser,
            pipeline.severity_table()?,
            pipeline.scoring_weights()?,
        );
        let job = Arc::new(AnalysisPipeline::new(
            pool.clone(),
            archive.clone(),
            analyzer,
            recorder,
            Arc::clone(&event_bus),
        ));
        let executor = AnalysisExecutor::new(
            job,
            pipeline.workers,
            pipeline.queue_limit,
            pipeline.analysis_timeout,
        );
        let trends = Arc::new(RwLock::new(TrendAggregator::new(pipeline.trend_window_days)));

        Ok(Self {
            pool,
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            archive,
            executor,
            trends,
            event_bus,
        })
    }
}
