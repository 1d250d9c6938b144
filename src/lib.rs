//! # bulk-load
//!
//! Bulk loader for tabular uploads: CSV and Excel files become documents, documents
//! are grouped into batches, and each batch is forwarded to an external document
//! store while progress is tracked per upload.
//!
//! ## Pipeline
//!
//! - [`ingest::BatchProducer`] decodes a file lazily into batches of [`Document`]s
//! - [`HttpForwarder`] posts each batch to the store's bulk-import endpoint
//! - [`TaskOrchestrator`] drives the two and records progress in a [`TaskRegistry`]
//! - [`api`] exposes uploads and status polling over HTTP
//!
//! ## Quick Start
//!
//! ```no_run
//! use bulk_load::{Config, HttpForwarder, TaskOrchestrator, UploadRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::from_env()?);
//!     let forwarder = Arc::new(HttpForwarder::new(&config.forwarder)?);
//!     let orchestrator = TaskOrchestrator::new(config, forwarder);
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let task_id = orchestrator
//!         .submit(UploadRequest {
//!             client_id: "C001".into(),
//!             business_name: "Acme".into(),
//!             filename: Some("customers.csv".into()),
//!             content: std::fs::read("customers.csv")?,
//!         })
//!         .await?;
//!
//!     println!("status: {:?}", orchestrator.get_status(task_id).await);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Collection naming
pub mod collection;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Batch forwarding to the document store
pub mod forwarder;
/// File decoding and batch production
pub mod ingest;
/// Task orchestration
pub mod orchestrator;
/// In-memory task registry
pub mod registry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use collection::collection_name;
pub use config::{Config, ForwarderConfig, PayloadKeys, ProcessingConfig};
pub use error::{ApiError, Error, ErrorDetail, IngestError, Result, ToHttpStatus, ValidationError};
pub use forwarder::{BatchSink, HttpForwarder};
pub use orchestrator::{TaskOrchestrator, UploadRequest};
pub use registry::TaskRegistry;
pub use types::{Batch, Document, Event, TaskId, TaskRecord, TaskStatus};

/// Resolves when the process receives a termination signal.
///
/// - **Unix:** SIGTERM or SIGINT (Ctrl+C).
/// - **Windows/other:** Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// A handler that cannot be registered (restricted containers, tests) is logged and
/// never fires; the other one still does. Used as the graceful shutdown trigger of
/// [`api::start_api_server`].
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
