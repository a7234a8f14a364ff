use std::time::Duration;

use crate::{
    configuration::Configuration,
    configuration_handler::ConfigurationHandler,
    database_interface::DatabaseInterface,
    http::{create_app, PROJECT_NAME, VERSION},
    mock_store::MockStore,
};
use anyhow::Context;
use tokio::{signal, time::sleep};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod appointment_manager;
mod backend;
mod configuration;
mod configuration_handler;
mod database_interface;
mod error;
mod http;
mod mock_store;
mod query;
mod schema;
mod submissions;
#[cfg(test)]
mod testutils;
mod types;

const CONNECT_ATTEMPTS: u32 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let configuration = ConfigurationHandler::parse_arguments();
    info!("Starting {PROJECT_NAME} v{VERSION}");
    info!("Environment: {}", configuration.environment());
    info!("Debug mode: {}", configuration.debug());

    let address = format!("0.0.0.0:{}", configuration.port());
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Accessible at {address}");

    let app = match connect_database(&configuration).await {
        Some(backend) => create_app(backend, &configuration),
        None => {
            info!("Serving from the mock store, nothing will be persisted");
            create_app(MockStore, &configuration)
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shut down");
    Ok(())
}

/// Opens the database store unless the configuration asks for the mock store.
/// Returns `None` when the service has to fall back to the mock store.
async fn connect_database<C: Configuration>(configuration: &C) -> Option<DatabaseInterface> {
    if configuration.uses_mock_store() {
        return None;
    }

    let database_url = match configuration.database_url() {
        Ok(Some(database_url)) => database_url,
        Ok(None) => {
            warn!("No database configured for environment {}", configuration.environment());
            return None;
        }
        Err(err) => {
            error!(%err, "Invalid database configuration");
            return None;
        }
    };

    for attempt in 1..=CONNECT_ATTEMPTS {
        match DatabaseInterface::new(&database_url, &configuration.project_id()) {
            Ok(backend) => {
                info!("Successfully connected to database");
                return Some(backend);
            }
            Err(err) if attempt < CONNECT_ATTEMPTS => {
                error!(%err, attempt, "Failed to establish database connection. Retry in 1 sec.");
                sleep(Duration::from_secs(1)).await;
            }
            Err(err) => error!(%err, attempt, "Failed to establish database connection."),
        }
    }

    error!("Giving up on the database after {CONNECT_ATTEMPTS} attempts");
    None
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(%err, "Failed to listen for SIGTERM");
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
