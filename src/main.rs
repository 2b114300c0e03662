use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

mod api;
mod config;
mod models;
mod services;
mod validation;

use config::Config;
use services::connection_pool::build_pool;
use services::database::PostgresBackend;
use services::query_service::QueryGuardService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Starting query guard on {}", config.server_address());

    // Connection pool for the backing store
    let pool = build_pool(&config.database.url, config.database.pool_max_size).map_err(|e| {
        error!("Failed to initialize connection pool: {}", e);
        e
    })?;

    let backend = Arc::new(PostgresBackend::new(pool));
    let service = Arc::new(QueryGuardService::new(backend, &config));

    // Create router with state
    let app = api::routes::create_router_with_state(service, config.clone());

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
