//! Shared harness for HTTP integration tests: fake collaborators, an app
//! built through the production router, and request helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use pqa_api::background::trends_updater;
use pqa_api::config::ServerConfig;
use pqa_api::router::build_app_router;
use pqa_api::state::{AppState, Collaborators};
use pqa_core::canonical::Leaf;
use pqa_core::file_type::FileType;
use pqa_core::remediation::TicketPayload;
use pqa_core::types::DbId;
use pqa_events::{EventBus, TicketError, TicketService};
use pqa_pipeline::reconstruction::{CanonicalizationError, ReconstructionError};
use pqa_pipeline::{FilesystemBlobStore, ParserService, PipelineConfig};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        sweep_interval_secs: 0,
        database_url: String::new(),
    }
}

/// Pipeline settings sized for tests: two workers, short retries.
pub fn test_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        workers: 2,
        queue_limit: 4,
        analysis_timeout: Duration::from_secs(10),
        ticket_retry_delays: vec![Duration::from_millis(1)],
        ..PipelineConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Fake collaborators
// ---------------------------------------------------------------------------

/// Parses `path=value` lines; reconstructions are registered per device.
#[derive(Default)]
pub struct FakeParser {
    reconstructions: Mutex<HashMap<(DbId, FileType), String>>,
    delay: Option<Duration>,
}

impl FakeParser {
    /// A parser whose reconstructions take `delay`.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub async fn set(&self, device_id: DbId, file_type: FileType, doc: &str) {
        self.reconstructions
            .lock()
            .await
            .insert((device_id, file_type), doc.to_string());
    }
}

#[async_trait]
impl ParserService for FakeParser {
    async fn canonicalize(
        &self,
        file_type: FileType,
        bytes: &[u8],
    ) -> Result<Vec<Leaf>, CanonicalizationError> {
        String::from_utf8_lossy(bytes)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| {
                line.split_once('=')
                    .map(|(path, value)| Leaf::new(path.trim(), value))
                    .ok_or_else(|| CanonicalizationError::Malformed {
                        file_type,
                        message: format!("no '=' in '{line}'"),
                    })
            })
            .collect()
    }

    async fn reconstruct(
        &self,
        device_id: DbId,
        file_type: FileType,
    ) -> Result<Vec<u8>, ReconstructionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reconstructions
            .lock()
            .await
            .get(&(device_id, file_type))
            .map(|doc| doc.clone().into_bytes())
            .ok_or(ReconstructionError::UnknownDevice {
                device_id,
                file_type,
            })
    }
}

/// Records every ticket it is asked to open.
#[derive(Default)]
pub struct FakeTickets {
    pub opened: Mutex<Vec<TicketPayload>>,
}

#[async_trait]
impl TicketService for FakeTickets {
    async fn create_ticket(&self, payload: &TicketPayload) -> Result<String, TicketError> {
        let mut opened = self.opened.lock().await;
        opened.push(payload.clone());
        Ok(format!("TICKET-{}", opened.len()))
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub state: AppState,
    pub parser: Arc<FakeParser>,
    pub tickets: Arc<FakeTickets>,
    pub blob_dir: tempfile::TempDir,
    router: Router,
    cancel: CancellationToken,
}

impl TestApp {
    /// A fresh handle on the router; `oneshot` consumes it.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Build the full application with fake collaborators and the trends
/// updater running.
pub fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with(pool, test_pipeline_config(), FakeParser::default())
}

pub fn build_test_app_with(pool: PgPool, pipeline: PipelineConfig, parser: FakeParser) -> TestApp {
    let config = test_config();
    let blob_dir = tempfile::tempdir().unwrap();
    let parser = Arc::new(parser);
    let tickets = Arc::new(FakeTickets::default());
    let event_bus = Arc::new(EventBus::default());

    let state = AppState::build(
        pool,
        config.clone(),
        pipeline,
        Collaborators {
            blobs: Arc::new(FilesystemBlobStore::new(blob_dir.path())),
            parser: parser.clone(),
            tickets: tickets.clone(),
        },
        event_bus.clone(),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    tokio::spawn(trends_updater::run(
        event_bus.subscribe(),
        Arc::clone(&state.trends),
        cancel.clone(),
    ));

    let router = build_app_router(state.clone(), &config);
    TestApp {
        state,
        parser,
        tickets,
        blob_dir,
        router,
        cancel,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(app: Router, method: Method, uri: &str, body: Body, json: bool) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if json {
        builder = builder.header("content-type", "application/json");
    }
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty(), false).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Body::empty(), false).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Body::from(body.to_string()), true).await
}

pub async fn patch_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PATCH, uri, Body::from(body.to_string()), true).await
}

pub async fn put_bytes(app: Router, uri: &str, body: &[u8]) -> Response<Body> {
    send(app, Method::PUT, uri, Body::from(body.to_vec()), false).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
