//! # Order Tracking API Server
//!
//! Hosts live tracking sessions for food-delivery orders. Each tracked order
//! polls the backend's live-location endpoint until the order is delivered,
//! cancelled or refunded; clients read the derived view over REST or follow it
//! over a WebSocket.

mod config;
mod error;
mod handlers;
mod routes;
mod state;
mod ws;

use crate::config::ApiConfig;
use crate::routes::create_router;
use crate::state::AppState;

use order_tracker::SessionRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("Starting Order Tracking Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ApiConfig::from_env();
    info!("Configuration loaded");
    info!("   API Port: {}", config.api_port);
    info!("   Order API: {}", config.client.base_url);
    info!("   Poll interval: {}s", config.poll_interval_secs);

    let state = AppState::new(config.clone())?;
    let app = create_router(state.clone());
    info!("Routes configured");

    let sweep = CancellationToken::new();
    tokio::spawn(run_prune_sweep(
        state.registry.clone(),
        config.prune_interval(),
        sweep.clone(),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    info!("API server listening on http://{}", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep.cancel();
    state.registry.stop_all();

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize logging with tracing. `LOG_FORMAT=json` selects JSON lines.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,order_api=debug,order_tracker=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

/// Periodically drop sessions that reached a terminal status
async fn run_prune_sweep(
    registry: Arc<SessionRegistry>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                registry.prune_terminal();
            }
        }
    }
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        }
    }
}
