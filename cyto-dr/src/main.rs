//! cyto-dr - read-only dashboard data service
//!
//! Serves the Schema Store written by cyto-pipeline, plus the analyses
//! derived from it, over HTTP. The database is opened read-only.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cyto_common::config::AppConfig;
use cyto_common::CytometryStore;
use cyto_dr::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cyto-dr
#[derive(Parser, Debug)]
#[command(name = "cyto-dr")]
#[command(about = "Read-only dashboard data service for the cytometry store")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "CYTO_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file written by cyto-pipeline
    #[arg(short, long, env = "CYTO_DATABASE")]
    database: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "CYTO_DR_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "CYTO_DR_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(host) = args.host {
        config.dashboard.host = host;
    }
    if let Some(port) = args.port {
        config.dashboard.port = port;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{},tower_http=debug", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cyto-dr v{}", env!("CARGO_PKG_VERSION"));
    info!("Database path: {}", config.database_path.display());

    let store = CytometryStore::open_readonly(&config.database_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open {} (run cyto-pipeline first to create it)",
                config.database_path.display()
            )
        })?;
    info!("Connected to database (read-only)");

    let state = AppState::new(store, config.analysis);
    let app = build_router(state);

    let listener =
        tokio::net::TcpListener::bind((config.dashboard.host.as_str(), config.dashboard.port))
            .await
            .context("Failed to bind to address")?;
    let addr = listener.local_addr()?;
    info!("cyto-dr listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
