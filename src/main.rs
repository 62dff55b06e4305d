// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::scheduler::PollScheduler;
use crate::application::session::{TelemetryEvent, TelemetrySession};
use crate::application::settings_store::SettingsStore;
use crate::infrastructure::config::{FileConfigStore, DEFAULT_CONFIG_PATH};
use crate::infrastructure::config_watcher::watch_config;
use crate::infrastructure::http_client::HttpStatusClient;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    farm, get_device, get_sparkline, health_check, list_devices, panel, refresh, select_device,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config_path = std::env::var("BITAXE_MONITOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let store = Arc::new(
        FileConfigStore::open(&config_path)
            .with_context(|| format!("failed to load settings from {}", config_path))?,
    );
    let settings = store.current();

    // Create session and scheduler (application layer)
    let session = Arc::new(TelemetrySession::new(
        store.clone(),
        Arc::new(HttpStatusClient::new()),
    ));
    let scheduler = PollScheduler::new(session.clone(), settings.paused);
    scheduler.start(settings.refresh_interval_secs());

    let events = tokio::spawn(log_cycles(session.subscribe()));

    let shutdown = CancellationToken::new();
    let watcher = tokio::spawn(watch_config(
        store.clone(),
        session.clone(),
        scheduler.clone(),
        shutdown.clone(),
    ));

    // Create application state
    let state = Arc::new(AppState {
        session,
        scheduler: scheduler.clone(),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/panel", get(panel))
        .route("/refresh", post(refresh))
        .route("/devices", get(list_devices))
        .route("/devices/:id", get(get_device))
        .route("/devices/:id/select", post(select_device))
        .route("/devices/:id/sparklines/:metric", get(get_sparkline))
        .route("/farm", get(farm))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = settings
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen_addr '{}'", settings.listen_addr))?;
    tracing::info!(%addr, devices = settings.devices.len(), "Starting bitaxe-monitor");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    shutdown.cancel();
    scheduler.teardown();
    let _ = watcher.await;
    events.abort();

    served?;
    Ok(())
}

async fn log_cycles(mut events: broadcast::Receiver<TelemetryEvent>) {
    let mut last_online = None;
    loop {
        match events.recv().await {
            Ok(TelemetryEvent::CycleComplete { cycle, online, total }) => {
                if last_online != Some(online) {
                    tracing::info!(cycle, online, total, "Devices online changed");
                    last_online = Some(online);
                }
            }
            Ok(TelemetryEvent::SeriesUpdated { device_id, metric, sample }) => {
                tracing::trace!(%device_id, %metric, value = ?sample.value, "Sample recorded");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
