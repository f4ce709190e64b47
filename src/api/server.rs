use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::{
    services::{get_file, get_status, health, submit_downloads},
    state::AppState,
};
use crate::config::Config;
use crate::fetcher::YtDlpFetcher;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build the HTTP router around `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/download", post(submit_downloads))
        .route("/status/{file_id}", get(get_status))
        .route("/files/{file_id}", get(get_file))
        .route("/health", get(health))
        .with_state(state)
        // Automatically decompress gzip request bodies
        .layer(RequestDecompressionLayer::new())
        // The browser front-end is served from another origin
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    let download_dir = config.downloads.dir.clone();
    tokio::fs::create_dir_all(&download_dir)
        .await
        .map_err(|e| format!("Failed to create {}: {}", download_dir.display(), e))?;
    info!(path = %download_dir.display(), "Download directory ready");

    let fetcher = YtDlpFetcher::new(config.fetcher.binary.clone());
    match fetcher.check_version().await {
        Ok(version) => info!(binary = fetcher.binary(), %version, "Fetcher available"),
        Err(e) => warn!(
            binary = fetcher.binary(),
            error = %e,
            "Fetcher version check failed, downloads will fail until it is installed"
        ),
    }

    let address = config.server.bind_addr;
    let state = AppState::new(config, Arc::new(fetcher));
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Nexlify API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
