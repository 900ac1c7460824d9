// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::application::events::EventBus;
use crate::application::peer_dispatch::run_peer_dispatch;
use crate::application::report_service::ReportService;
use crate::application::session_controller::SessionController;
use crate::application::telemetry_pipeline::TelemetryPipeline;
use crate::infrastructure::config::load_rig_config;
use crate::infrastructure::file_archive::FileReportArchive;
use crate::infrastructure::ws_channel::ChannelAdapter;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

const PEER_EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_rig_config().context("Failed to load rig configuration")?;

    // Telemetry side (application layer)
    let events = EventBus::new();
    let telemetry = TelemetryPipeline::new(events.clone());

    // Channel to the rig (infrastructure layer)
    let (peer_tx, peer_rx) = mpsc::channel(PEER_EVENT_BUFFER);
    let channel = Arc::new(ChannelAdapter::new(peer_tx));

    let session = SessionController::new(
        channel.clone(),
        telemetry.clone(),
        events.clone(),
        config.timing.setpoint_interval(),
    );
    session
        .configure(config.ramp.settings())
        .await
        .context("Invalid default ramp")?;

    let archive = Arc::new(FileReportArchive::open(&config.archive.directory).await?);
    let reports = ReportService::new(archive, session.clone(), telemetry.clone());

    // Background tasks
    let flush_loop = telemetry.spawn_flush_loop(config.timing.flush_interval());
    let dispatch = tokio::spawn(run_peer_dispatch(
        peer_rx,
        telemetry.clone(),
        session.clone(),
        events.clone(),
    ));

    if config.peer.connect_on_startup {
        // The rig may come up after us; POST /link/connect retries.
        if let Err(e) = channel.connect(&config.peer.endpoint).await {
            tracing::warn!("{}", e);
        }
    }

    let state = Arc::new(AppState {
        session: session.clone(),
        telemetry,
        reports,
        channel,
        events,
        view: config.view.clone(),
        ramp: config.ramp.clone(),
        peer_endpoint: config.peer.endpoint.clone(),
    });

    let router = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!("Starting rig-telemetry service on {}", config.server.bind);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    session.dispose().await;
    flush_loop.abort();
    dispatch.abort();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
