//! DocMill Server binary
//!
//! Loads configuration, checks engine availability, optionally runs a
//! startup retention sweep, then serves the HTTP API until ctrl-c or
//! SIGTERM.

use std::net::SocketAddr;

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docmill_server::config::Config;
use docmill_server::engine::ConversionEngine;
use docmill_server::retention;
use docmill_server::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docmill_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting DocMill Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Output root: {}", config.output_root.display());
    tracing::info!("Engine: {:?}", config.engine);

    std::fs::create_dir_all(&config.output_root).expect("Failed to create output root");

    let state = AppState::new(config.clone());

    if state.engine().is_available().await {
        tracing::info!("Conversion engine '{}' is available", state.engine().name());
    } else {
        tracing::warn!(
            "Conversion engine '{}' is not responding; conversions will fail until it is installed \
             (for Marker: pip install marker-pdf[full])",
            state.engine().name()
        );
    }

    // Startup retention sweep
    if config.cleanup_on_start {
        let report = retention::enforce(
            &config.output_root,
            config.keep_recent,
            state.store().as_ref(),
        )
        .await;
        tracing::info!(
            kept = report.kept,
            removed_dirs = report.removed_dirs,
            removed_files = report.removed_files,
            "Startup cleanup completed"
        );
    }

    let app = docmill_server::app(state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("DocMill Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shutdown complete");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
