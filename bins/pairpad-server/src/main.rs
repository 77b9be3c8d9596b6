mod config;
mod engine;
mod handlers;
mod hub;
mod preprocess;
mod routes;

#[cfg(test)]
mod engine_tests;

use crate::config::ServerConfig;
use crate::engine::Executors;
use crate::handlers::AppState;
use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("pairpad server booting...");

    let config = ServerConfig::from_env();

    let executors = Executors::connect().context("failed to initialise sandbox executors")?;
    if config.prepull_images {
        info!("ENV_RUN=local, pre-pulling sandbox images");
        executors
            .prepull_images()
            .await
            .context("failed to pre-pull sandbox images")?;
    }

    let state = Arc::new(AppState { executors });

    let (hub, broadcast_rx) = hub::Hub::new();
    tokio::spawn(Arc::clone(&hub).dispatch(broadcast_rx));

    // Both listeners must be bound before the process counts as ready.
    let http_listener = TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;
    let ws_listener = TcpListener::bind(&config.ws_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.ws_addr))?;

    info!("HTTP server listening on {}", config.http_addr);
    info!("WebSocket server listening on {}", config.ws_addr);
    info!("Ready to accept submissions");

    let http = axum::serve(http_listener, routes::routes(state));
    let ws = axum::serve(ws_listener, hub::router(hub));

    tokio::try_join!(
        async { http.await.context("HTTP server error") },
        async { ws.await.context("WebSocket server error") },
    )?;

    Ok(())
}
