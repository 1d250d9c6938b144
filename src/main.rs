//! bulk-load server - main entry point

use bulk_load::{Config, HttpForwarder, TaskOrchestrator, api};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "bulk_load=info,tower_http=info";

#[tokio::main]
async fn main() -> bulk_load::Result<()> {
    // RUST_LOG takes precedence over the built-in filter
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting bulk-load");

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e);
        }
    };
    tracing::info!(
        forwarder = %config.forwarder.import_url(),
        batch_size = config.processing.batch_size,
        max_file_size_mb = config.processing.max_file_size_mb,
        "Configuration loaded"
    );

    let forwarder = Arc::new(HttpForwarder::new(&config.forwarder)?);
    let orchestrator = Arc::new(TaskOrchestrator::new(config.clone(), forwarder));

    api::start_api_server(orchestrator, config).await?;

    tracing::info!("Shutting down bulk-load");
    Ok(())
}
