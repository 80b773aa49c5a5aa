//! # signaged — signage terminal daemon
//!
//! Composition root that wires all adapters together and runs the
//! playback orchestrator.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the tracing subscriber
//! - Open the `SQLite` local state, falling back to memory when it cannot
//! - Construct the HTTP client, preloader and headless presentation
//! - Run the orchestrator on a single-threaded runtime
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use signage_adapter_headless::{HeadlessAudio, HeadlessRenderer};
use signage_adapter_storage_sqlite_sqlx::SqliteLocalState;
use signage_app::event_bus::{InProcessEventBus, OrchestratorEvent};
use signage_app::local_state::ResilientStore;
use signage_app::orchestrator::Orchestrator;

use crate::config::Config;

fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .with_context(|| format!("invalid log filter {:?}", config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let client = config.http().build().context("building http client")?;
    let preloader = Arc::new(client.preloader(config.media.preload_concurrency));
    let store = open_store(config.database_url()).await;

    let renderer = Arc::new(HeadlessRenderer::new(config.media.simulated_media()));
    let sink = Arc::new(HeadlessAudio::default());

    let events = InProcessEventBus::new(256);
    tokio::spawn(log_events(events.subscribe()));

    tracing::info!(server = %config.server.url, "signaged starting");
    let orchestrator = Orchestrator::new(
        config.orchestrator(),
        Arc::new(client),
        store,
        renderer,
        preloader,
        sink,
        events,
    );
    orchestrator.run(shutdown_signal()).await;

    Ok(())
}

async fn open_store(database_url: &str) -> ResilientStore<SqliteLocalState> {
    let db_config = signage_adapter_storage_sqlite_sqlx::Config {
        database_url: database_url.to_string(),
    };
    match db_config.build().await {
        Ok(db) => ResilientStore::new(SqliteLocalState::new(db.pool().clone())),
        Err(err) => {
            tracing::warn!(error = %err, database_url, "local storage unavailable, keeping state in memory");
            ResilientStore::memory_only()
        }
    }
}

async fn log_events(mut events: broadcast::Receiver<OrchestratorEvent>) {
    loop {
        match events.recv().await {
            Ok(OrchestratorEvent::Connectivity(connectivity)) => {
                tracing::info!(?connectivity, "connectivity changed");
            }
            Ok(OrchestratorEvent::Committed { version }) => {
                tracing::info!(%version, "configuration committed");
            }
            Ok(OrchestratorEvent::ModeChanged(mode)) => tracing::info!(?mode, "mode changed"),
            Ok(OrchestratorEvent::PairingCode(code)) => {
                tracing::info!(%code, "waiting to be paired");
            }
            Ok(event) => tracing::debug!(?event, "orchestrator event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log lagged, some events were dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown requested");
}
