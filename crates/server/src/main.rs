use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modfetch_core::{
    create_queue, load_config, validate_config, AdmissionController, Fetcher,
    ProxyModuleFetcher, ProxyOrigin, SqliteStore, Store, TaskHandler,
};
use modfetch_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("MODFETCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!(version = VERSION, "Configuration loaded successfully");
    info!("Origin: {}", config.origin.url);
    info!("Database path: {:?}", config.database.path);

    // Create SQLite store
    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::new(&config.database.path).context("Failed to create store")?,
    );
    info!("Store initialized");

    // Origin and module fetcher share one HTTP client
    let origin = ProxyOrigin::new(&config.origin);
    let module_fetcher = ProxyModuleFetcher::new(origin.clone());

    let admission = AdmissionController::new(config.admission.max_in_flight_cost);
    info!(
        ceiling = config.admission.max_in_flight_cost,
        "Admission controller initialized"
    );

    // No page cache is served from this process, so there is nothing to
    // invalidate. A frontend cache is attached with `Fetcher::with_cache`.
    let fetcher = Arc::new(Fetcher::new(
        config.fetch.clone(),
        Arc::new(origin),
        Arc::new(module_fetcher),
        store,
        admission,
    ));

    // Create queue
    let handler: Arc<dyn TaskHandler> = fetcher.clone();
    let queue = create_queue(&config.queue, handler).context("Failed to create queue")?;
    info!("Using queue backend: {}", queue.backend_name());

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), fetcher, queue));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
