//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`uploads`]: File upload intake
//! - [`tasks`]: Task status lookup
//! - [`system`]: Root info, health, events, OpenAPI

use crate::types::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

mod system;
mod tasks;
mod uploads;

// Re-export all handlers so `routes::function_name` works
pub use system::*;
pub use tasks::*;
pub use uploads::*;

// ============================================================================
// Response Types (shared across handlers)
// ============================================================================

/// Response for POST /bulk-load-data/file
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UploadAccepted {
    /// Id to poll the task status with
    pub task_id: TaskId,
    /// Always `queued`
    pub status: TaskStatus,
    /// Human-readable acknowledgement
    pub message: String,
    /// Client identifier from the form
    pub client_id: String,
    /// Business name from the form
    pub business_name: String,
    /// Uploaded filename
    pub filename: String,
}

/// Response for GET /bulk-load-data/health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// Always `healthy`
    pub status: String,
    /// Service name
    pub service: String,
    /// Base address of the document store
    pub forwarder_url: String,
    /// Service version
    pub version: String,
    /// Number of tasks tracked since startup
    pub tasks: usize,
}

/// Response for GET /
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ServiceInfo {
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Always `running`
    pub status: String,
}
