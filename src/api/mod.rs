//! REST API server module
//!
//! Provides an OpenAPI 3 compliant REST API for uploading files and tracking the
//! resulting ingestion tasks.

use crate::{Config, Result, TaskOrchestrator};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Service name reported by the root and health endpoints
pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

/// Allowance for multipart framing and the text fields on top of the file itself
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Request body limit for the configured maximum file size
pub(crate) fn body_limit(config: &Config) -> usize {
    let limit = config
        .processing
        .max_file_size_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Bulk load
/// - `POST /bulk-load-data/file` - Upload a CSV or Excel file
/// - `GET /bulk-load-data/status/:task_id` - Get task status
/// - `GET /bulk-load-data/health` - Health check
///
/// ## System
/// - `GET /` - Service information
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
/// - `GET /events` - Server-sent events stream
pub fn create_router(orchestrator: Arc<TaskOrchestrator>, config: Arc<Config>) -> Router {
    let state = AppState::new(orchestrator, config.clone());

    let router = Router::new()
        // Bulk load
        .route("/bulk-load-data/file", post(routes::upload_file))
        .route("/bulk-load-data/status/:task_id", get(routes::get_task_status))
        .route("/bulk-load-data/health", get(routes::health_check))
        // System
        .route("/", get(routes::root_info))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // Swagger UI serves its own copy of the spec so it does not collide with /openapi.json
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit(&config)))
        .layer(TraceLayer::new_for_http());

    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin. All methods and headers are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Serve the API on an already bound listener until `shutdown` resolves
///
/// Tasks still running when the server stops are not awaited.
pub async fn serve<F>(
    listener: TcpListener,
    orchestrator: Arc<TaskOrchestrator>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(orchestrator, config);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

/// Start the API server on the configured bind address.
///
/// Runs until SIGTERM or SIGINT (Ctrl+C on other platforms) is received.
///
/// # Example
///
/// ```no_run
/// use bulk_load::{Config, HttpForwarder, TaskOrchestrator};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let forwarder = Arc::new(HttpForwarder::new(&config.forwarder)?);
/// let orchestrator = Arc::new(TaskOrchestrator::new(config.clone(), forwarder));
///
/// // Start API server (blocks until shutdown)
/// bulk_load::api::start_api_server(orchestrator, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    orchestrator: Arc<TaskOrchestrator>,
    config: Arc<Config>,
) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        forwarder = %config.forwarder.import_url(),
        "API server listening"
    );

    serve(listener, orchestrator, config, crate::shutdown_signal()).await
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
