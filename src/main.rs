use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use customer360_backend::api::handlers::AppState;
use customer360_backend::api::routes::create_router;
use customer360_backend::config::Config;
use customer360_backend::services::warehouse::{SessionManager, SnowflakeConnector};
use customer360_backend::services::QueryExecutor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first so RUST_LOG from .env is honoured
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting server on {}", config.server_address());

    let connector = SnowflakeConnector::new(config.warehouse.request_timeout())
        .context("Failed to build warehouse client")?;

    // Connects lazily on the first query
    let session = Arc::new(SessionManager::new(
        Arc::new(connector),
        config.warehouse.credential_resolver(),
    ));

    let executor = QueryExecutor::new(session.clone())
        .with_retries(config.warehouse.query_retries)
        .with_transient_errors(config.warehouse.transient_errors())
        .with_statement_timeout(config.warehouse.statement_timeout());

    let state = AppState {
        executor: Arc::new(executor),
    };

    let app: Router = create_router(state);

    let addr: SocketAddr = config
        .server_address()
        .parse()
        .with_context(|| format!("Invalid server address {}", config.server_address()))?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    session.shutdown().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
