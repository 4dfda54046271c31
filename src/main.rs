// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::pidtune_service::PidTuneService;
use crate::infrastructure::config::load_settings;
use crate::infrastructure::octoprint_client::OctoPrintClient;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    api_command, command_queueing, command_sent, current_data, events, get_pid, health_check,
    line_received,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let settings = load_settings()?;
    tracing::debug!("Settings: {:?}", settings);

    // Host adapter (infrastructure layer)
    let host = Arc::new(OctoPrintClient::new(
        settings.octoprint.url.clone(),
        settings.octoprint.api_key.clone(),
    ));

    // Service (application layer)
    let service = PidTuneService::new(host, settings.plugin.clone());
    service.startup().await;

    let state = Arc::new(AppState { service });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/hooks/received", post(line_received))
        .route("/hooks/sent", post(command_sent))
        .route("/hooks/queueing", post(command_queueing))
        .route("/hooks/current-data", post(current_data))
        .route("/api/plugin/pidtune", get(get_pid).post(api_command))
        .route("/events", get(events))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = settings.server.bind.parse()?;
    tracing::info!("Starting pidtune-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
