use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pqa_api::background::{sweep, trends_updater};
use pqa_api::config::ServerConfig;
use pqa_api::router::build_app_router;
use pqa_api::state::{AppState, Collaborators};
use pqa_events::{EventBus, HttpTicketService};
use pqa_pipeline::{FilesystemBlobStore, HttpParserService, PipelineConfig, PipelineExecutor};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pqa_api=debug,pqa_pipeline=debug,tower_http=debug".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        workers = pipeline_config.workers,
        queue_limit = pipeline_config.queue_limit,
        analysis_timeout_secs = pipeline_config.analysis_timeout.as_secs(),
        blob_root = %pipeline_config.blob_root.display(),
        "Loaded pipeline configuration"
    );

    // --- Database ---
    let pool = pqa_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    pqa_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    pqa_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Collaborators ---
    let blobs = FilesystemBlobStore::new(pipeline_config.blob_root.clone());
    blobs
        .validate()
        .await
        .expect("Blob root is not a writable directory");
    let parser = HttpParserService::new(pipeline_config.parser_url.clone())
        .expect("Failed to build parser client");
    let tickets = HttpTicketService::new(pipeline_config.ticket_url.clone())
        .expect("Failed to build ticket client");

    // --- Event bus and state ---
    let event_bus = Arc::new(EventBus::default());
    let state = AppState::build(
        pool.clone(),
        config.clone(),
        pipeline_config,
        Collaborators {
            blobs: Arc::new(blobs),
            parser: Arc::new(parser),
            tickets: Arc::new(tickets),
        },
        Arc::clone(&event_bus),
    )
    .expect("Invalid pipeline configuration");

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    // Subscribe before seeding so no run committed in between is missed.
    let trend_events = event_bus.subscribe();
    let seeded = trends_updater::seed(&pool, &state.trends)
        .await
        .expect("Failed to seed dashboard trends");
    tracing::info!(seeded, "Dashboard trends seeded");
    let mut background = vec![tokio::spawn(trends_updater::run(
        trend_events,
        Arc::clone(&state.trends),
        cancel.clone(),
    ))];

    if config.sweep_interval_secs > 0 {
        background.push(tokio::spawn(sweep::run(
            pool.clone(),
            Arc::clone(&state.executor),
            Duration::from_secs(config.sweep_interval_secs),
            cancel.clone(),
        )));
    } else {
        tracing::info!("Scheduled sweeps disabled");
    }

    // --- Router ---
    let executor = Arc::clone(&state.executor);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    // Cancel queued and computing analyses; commits already underway finish.
    executor.shutdown();
    drain_executor(&executor, grace).await;

    cancel.cancel();
    let stopped = tokio::time::timeout(grace, futures::future::join_all(background)).await;
    if stopped.is_err() {
        tracing::warn!("Background tasks did not stop within the shutdown timeout");
    }

    drop(event_bus);
    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait until no analysis is queued or running, or `grace` has elapsed.
async fn drain_executor(executor: &PipelineExecutor, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        let active = executor.active().await;
        if active == 0 {
            tracing::info!("Analysis executor drained");
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!(active, "Analyses still active at shutdown deadline");
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
