//! fleeting - ephemeral image processing server.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleeting::{
    config::Config,
    pipeline::ProcessService,
    server::{create_router, RouterConfig},
    store::ArtifactStore,
    transform::ImageTransformEngine,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("fleeting v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Working directory: {}", config.work_dir.display());
    info!("  Retention: {}s", config.retention_secs);
    info!("  Upload limit: {} bytes", config.max_upload_bytes);
    info!("  JPEG quality: {}", config.jpeg_quality);
    match config.cors_origins {
        Some(ref origins) => info!("  CORS origins: {}", origins.join(", ")),
        None => info!("  CORS origins: any"),
    }

    let store = match ArtifactStore::new(&config.work_dir, config.retention()) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to prepare working directory: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Files from a previous process have no pending deletion
    match store.stored_file_count().await {
        Ok(0) => {}
        Ok(count) => warn!(
            "  {} file(s) left in {} by a previous run will not be deleted automatically",
            count,
            config.work_dir.display()
        ),
        Err(e) => warn!("  Could not scan working directory: {}", e),
    }

    let engine = ImageTransformEngine::new().with_jpeg_quality(config.jpeg_quality);
    let service = ProcessService::new(store.clone(), engine);
    let router = create_router(service, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!(
        "    curl -F image=@photo.png -F operation=rotate -F degrees=90 http://{}/process",
        addr
    );
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let purged = store.purge().await;
    info!("Shutdown complete, removed {} pending artifact(s)", purged);

    if let Err(e) = served {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "fleeting=debug,tower_http=debug"
    } else {
        "fleeting=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_max_upload_bytes(config.max_upload_bytes);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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

    info!("Shutdown signal received, draining connections");
}
