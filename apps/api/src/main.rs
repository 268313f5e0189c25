//! Atlas access-control API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use atlas_core::AppError;
use tracing::info;

use crate::api_config::{ApiConfig, StoreBackend, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    if config.migrate_only {
        if let StoreBackend::Postgres {
            database_url,
            max_connections,
        } = &config.store
        {
            api_services::connect_and_migrate(database_url, *max_connections).await?;
        }
        info!("database migrations applied successfully");
        return Ok(());
    }

    let ports = api_services::build_ports(&config).await?;
    let app_state = api_services::build_app_state(ports, config.actor_header.clone());
    api_services::bootstrap_access(&app_state, config.bootstrap_super_admin).await?;

    let app = api_router::build_router(app_state);
    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, actor_header = config.actor_header.as_str(), "atlas-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
