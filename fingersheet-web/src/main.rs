//! fingersheet-web - Sheet music fingering service
//!
//! Accepts PDF, JPEG and MusicXML uploads and returns a copy annotated
//! with finger recommendations for the chosen skill level.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fingersheet_common::config::{
    load_toml_config_or_default, CliOverrides, ConfigResolver, EnvOverrides, UploadFolderInitializer,
};
use fingersheet_common::logging::init_tracing;
use fingersheet_common::Profile;
use fingersheet_web::{build_router, AppState};
use tokio::signal;
use tracing::info;

/// Command-line arguments for fingersheet-web
#[derive(Parser, Debug)]
#[command(name = "fingersheet-web")]
#[command(about = "Sheet music fingering annotation service")]
#[command(version)]
struct Args {
    /// Configuration file (default: <config_dir>/fingersheet/config.toml)
    #[arg(short, long, env = "FINGERSHEET_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "FINGERSHEET_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "FINGERSHEET_BIND")]
    bind: Option<String>,

    /// Folder for uploads and annotated copies
    #[arg(short, long)]
    upload_folder: Option<PathBuf>,

    /// Log filter, e.g. "info" or "fingersheet_engine=debug"
    #[arg(short, long, env = "FINGERSHEET_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let profile = Profile::from_env();

    let config = ConfigResolver::new(profile)
        .with_cli(CliOverrides {
            upload_folder: args.upload_folder,
            bind_address: args.bind,
            port: args.port,
            log_level: args.log_level,
        })
        .with_env(EnvOverrides::from_process_env())
        .with_toml(load_toml_config_or_default(args.config.as_deref()))
        .resolve();

    init_tracing(&config.log_level, config.log_file.as_deref()).context("Failed to initialize logging")?;

    // Build identification first, before any slow startup work
    info!(
        "Starting fingersheet-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!(
        profile = config.profile.name(),
        debug = config.debug,
        tesseract = %config.tesseract_cmd,
        pdftoppm = %config.pdftoppm_cmd,
        "Configuration resolved"
    );

    UploadFolderInitializer::new(config.upload_folder.clone())
        .ensure_directory_exists()
        .context("Failed to prepare upload folder")?;
    info!("Upload folder: {}", config.upload_folder.display());

    let address = config.listen_address();
    let app = build_router(AppState::from_config(config));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    info!("fingersheet-web listening on http://{}", address);
    info!("Health check: http://{}/health", address);

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
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
