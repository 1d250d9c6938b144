//! Error types for bulk-load
//!
//! This module provides the error handling for the crate:
//! - Domain error types for upload validation and file ingestion
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for bulk-load operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bulk-load
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "BATCH_SIZE")
        key: Option<String>,
    },

    /// Upload rejected before a task was created
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Task not found
    #[error("task not found: {0}")]
    NotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Upload validation errors
///
/// These are reported synchronously to the caller and never create a task.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The uploaded file part carried no filename
    #[error("file has no name")]
    MissingFilename,

    /// A required form field was not sent
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the missing form field
        field: String,
    },

    /// Filename suffix is not one of the supported formats
    #[error("unsupported format for {filename}: use CSV or Excel (.csv, .xlsx, .xls)")]
    UnsupportedExtension {
        /// The rejected filename
        filename: String,
    },

    /// Upload exceeds the configured size limit
    #[error("file exceeds the maximum size of {max_mb}MB ({size_bytes} bytes received)")]
    FileTooLarge {
        /// Size of the received file in bytes
        size_bytes: u64,
        /// Configured limit in megabytes
        max_mb: u64,
    },

    /// The request body was cut off at the upload limit before the file was read
    #[error("file exceeds the maximum size of {max_mb}MB")]
    UploadLimitExceeded {
        /// Configured limit in megabytes
        max_mb: u64,
    },

    /// The multipart body could not be read
    #[error("malformed upload: {0}")]
    MalformedUpload(String),
}

/// Errors raised while decoding a file into document batches
///
/// A running task records these as its failure reason.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Filename suffix matches no known reader
    #[error("unsupported file format: {filename}")]
    UnsupportedFormat {
        /// The filename that could not be dispatched
        filename: String,
    },

    /// Delimited text could not be decoded or parsed
    #[error("could not decode file: {reason}")]
    Decode {
        /// What the decoder or CSV reader reported
        reason: String,
    },

    /// The file has no header columns
    #[error("file has no header row")]
    NoHeaders,

    /// The workbook could not be read
    #[error("could not read spreadsheet: {reason}")]
    Spreadsheet {
        /// What the workbook reader reported
        reason: String,
    },
}

impl From<csv::Error> for IngestError {
    fn from(error: csv::Error) -> Self {
        IngestError::Decode {
            reason: error.to_string(),
        }
    }
}

impl From<calamine::Error> for IngestError {
    fn from(error: calamine::Error) -> Self {
        IngestError::Spreadsheet {
            reason: error.to_string(),
        }
    }
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "unsupported_extension",
///     "message": "validation error: unsupported format for a.txt: use CSV or Excel (.csv, .xlsx, .xls)",
///     "details": {
///       "filename": "a.txt"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "file_too_large")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - rejected upload
            Error::Config { .. } => 400,
            Error::Validation(
                ValidationError::FileTooLarge { .. } | ValidationError::UploadLimitExceeded { .. },
            ) => 413,
            Error::Validation(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 500 Internal Server Error
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,

            // 502 Bad Gateway - document store unreachable
            Error::Network(_) => 502,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(e) => match e {
                ValidationError::MissingFilename => "missing_filename",
                ValidationError::MissingField { .. } => "missing_field",
                ValidationError::UnsupportedExtension { .. } => "unsupported_extension",
                ValidationError::FileTooLarge { .. } | ValidationError::UploadLimitExceeded { .. } => {
                    "file_too_large"
                }
                ValidationError::MalformedUpload(_) => "malformed_upload",
            },
            Error::NotFound(_) => "not_found",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::Validation(ValidationError::MissingField { field }) => {
                Some(serde_json::json!({
                    "field": field,
                }))
            }
            Error::Validation(ValidationError::UnsupportedExtension { filename }) => {
                Some(serde_json::json!({
                    "filename": filename,
                    "supported": crate::ingest::SUPPORTED_EXTENSIONS,
                }))
            }
            Error::Validation(ValidationError::FileTooLarge { size_bytes, max_mb }) => {
                Some(serde_json::json!({
                    "size_bytes": size_bytes,
                    "max_mb": max_mb,
                }))
            }
            Error::Validation(ValidationError::UploadLimitExceeded { max_mb }) => {
                Some(serde_json::json!({
                    "max_mb": max_mb,
                }))
            }
            Error::NotFound(id) => Some(serde_json::json!({
                "task_id": id,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
