//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the bulk-load REST API using utoipa for
//! compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the bulk-load REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation (if enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "bulk-load REST API",
        version = "0.1.0",
        description = "Upload CSV and Excel files, forward their rows to the document store in batches, and track progress",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8088", description = "Local development server")
    ),
    paths(
        // Uploads
        crate::api::routes::upload_file,

        // Tasks
        crate::api::routes::get_task_status,

        // System
        crate::api::routes::root_info,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::TaskId,
        crate::types::TaskStatus,
        crate::types::TaskRecord,
        crate::types::Event,

        // API request/response types from routes
        crate::api::routes::UploadAccepted,
        crate::api::routes::HealthResponse,
        crate::api::routes::ServiceInfo,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "bulk-load", description = "File uploads and task status"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
