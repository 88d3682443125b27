//! SceneVault server: process wiring for the video processing pipeline and
//! job scheduler — exactly one `PhaseScheduler` and one `Scanner`,
//! constructed here and torn down on shutdown. Parses config, connects the
//! database, builds every singleton, runs restart reconciliation, serves,
//! then drains on signal.

use std::sync::Arc;
use std::time::Duration;

use scenevault_core::{
    Clock, EventBus, FingerprintStore, InProcEventBus, JobLedger,
    JobLedgerStore, PhaseScheduler, PostgresStore, Scanner, SceneEnqueuer, SceneStore,
    ScanRecordStore, StorageRootStore, SystemClock,
};
use scenevault_core::scanner::RealFs;
use scenevault_server::app_state::AppState;
use scenevault_server::config::ServerConfig;
use scenevault_server::transcoder::{FfmpegPaths, ProcessTranscoder};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scenevault_server=info,scenevault_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(ServerConfig::from_env()?);
    info!(addr = %config.bind_addr(), "scenevault-server configuration loaded");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../migrations").run(&pool).await?;

    let store = Arc::new(PostgresStore::connect(pool).await?);
    let scenes: Arc<dyn SceneStore> = store.clone();
    let fingerprints: Arc<dyn FingerprintStore> = store.clone();
    let job_ledger_store: Arc<dyn JobLedgerStore> = store.clone();
    let scans: Arc<dyn ScanRecordStore> = store.clone();
    let roots: Arc<dyn StorageRootStore> = store.clone();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let bus: Arc<dyn EventBus> = Arc::new(InProcEventBus::default());
    let transcoder = Arc::new(ProcessTranscoder::new(FfmpegPaths::default()));

    let ledger = Arc::new(JobLedger::new(job_ledger_store, clock.clone()));

    let root_token = CancellationToken::new();

    let scheduler = PhaseScheduler::new(
        scenes.clone(),
        fingerprints,
        ledger.clone(),
        bus.clone(),
        transcoder,
        clock.clone(),
        config.core.clone(),
        config.storage_base_dir.clone(),
        root_token.clone(),
    );

    let enqueuer: Arc<dyn SceneEnqueuer> = scheduler.clone();
    let fs = Arc::new(RealFs::new());
    let scanner = Scanner::new(fs, roots, scenes.clone(), scans, bus.clone(), enqueuer, clock.clone());

    // Before any external enqueue is accepted, cancel orphaned running work
    // and re-derive the phase channels from durable store state.
    scheduler.reconcile_on_restart().await?;
    scanner.reconcile_on_restart().await?;
    info!("restart reconciliation complete");

    let sweeper = ledger.spawn_sweeper(config.core.retention, root_token.clone());
    let trash_sweeper =
        scenevault_core::spawn_trash_sweeper(scenes, clock.clone(), config.core.retention, root_token.clone());

    let state = AppState { scheduler, scanner, ledger, bus, config: config.clone() };
    let app = scenevault_server::create_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %config.bind_addr(), "scenevault-server listening");

    let shutdown_grace = Duration::from_secs(config.shutdown_grace_secs);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(root_token.clone()))
        .await?;

    // Process shutdown cancels all in-flight work via the root token: give
    // workers the configured grace window to drain before the process
    // exits; anything left is picked up by restart reconciliation on the
    // next boot.
    tokio::time::sleep(shutdown_grace).await;
    sweeper.abort();
    trash_sweeper.abort();
    info!("scenevault-server shut down");
    Ok(())
}

async fn shutdown_signal(root_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    warn!("shutdown signal received, cancelling root token");
    root_token.cancel();
}
