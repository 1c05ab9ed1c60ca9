// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::connection_manager::ConnectionManager;
use crate::application::dashboard_controller::DashboardController;
use crate::infrastructure::config::{load_dashboard_config, reset_url, stream_url};
use crate::infrastructure::reset_client::HttpResetClient;
use crate::infrastructure::ws_transport::WsConnectionRunner;
use crate::presentation::app_state::AppState;
use crate::presentation::frame_sink::LatestFrameSink;
use crate::presentation::handlers::{get_dashboard, health_check, reset_dashboard};

const CONTROLLER_QUEUE_DEPTH: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_dashboard_config()?;
    let retention = config.retention_policy()?;
    let stream_endpoint = stream_url(&config.source.base_url)?;
    let reset_endpoint = reset_url(&config.source.base_url)?;

    // Create adapters (infrastructure layer)
    let reset_client = Arc::new(HttpResetClient::new(reset_endpoint));
    let frames = Arc::new(LatestFrameSink::new());

    // Single owner of all series state (application layer)
    let controller = DashboardController::new(
        retention,
        config.display.voltage_axis_margin,
        frames.clone(),
        reset_client,
    );
    let (controller_tx, controller_rx) = mpsc::channel(CONTROLLER_QUEUE_DEPTH);
    let controller_task = tokio::spawn(controller.run(controller_rx));

    // Streaming connection
    let manager = ConnectionManager::new(config.backoff()?, config.heartbeat_interval()?);
    let runner = WsConnectionRunner::new(
        stream_endpoint,
        manager,
        config.connect_timeout(),
        controller_tx.clone(),
    );
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let stream_task = tokio::spawn(runner.run(shutdown_rx));

    let state = Arc::new(AppState {
        frames,
        controller: controller_tx,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/dashboard", get(get_dashboard))
        .route("/reset", post(reset_dashboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config
        .http
        .listen_addr
        .parse()
        .with_context(|| format!("invalid http.listen_addr: {}", config.http.listen_addr))?;
    tracing::info!("Starting battery-dashboard on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the stream first; the controller drains once every sender is gone
    let _ = shutdown_tx.send(());
    stream_task.await?;
    controller_task.await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
