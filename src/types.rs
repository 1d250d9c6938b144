//! Core types for bulk-load

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

/// Name of the synthetic identifier field added to every document
pub const ID_FIELD: &str = "_id";

/// Unique identifier for an ingestion task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Task status
///
/// `Queued` and `Processing` are the only non-terminal states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted and waiting for its run to start
    Queued,
    /// Batches are being produced and forwarded
    Processing,
    /// Every batch was forwarded
    Completed,
    /// The run finished but at least one batch was rejected
    CompletedWithErrors,
    /// The run stopped on a file or internal error
    Failed,
}

impl TaskStatus {
    /// Whether the status can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::CompletedWithErrors | TaskStatus::Failed
        )
    }

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::CompletedWithErrors => "completed_with_errors",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status record of one upload, as returned by the status endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskRecord {
    /// Task identifier
    pub task_id: TaskId,
    /// Current state
    pub status: TaskStatus,
    /// Estimated progress (0-100)
    pub progress: u8,
    /// Human-readable description of the current state
    pub message: String,
    /// Rows read so far
    pub total_rows: u64,
    /// Rows handed to the forwarder so far (always equal to `total_rows`)
    pub processed_rows: u64,
    /// One-based number of the batch in flight
    pub current_batch: u64,
    /// Batches produced so far
    pub total_batches: u64,
    /// Batches the document store rejected
    pub failed_batches: u64,
    /// Target collection, set once the run completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    /// Wall-clock duration of the run, set in terminal states
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_seconds: Option<f64>,
    /// Failure reason, set only when `status` is `failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Client identifier from the upload
    pub client_id: String,
    /// Business name from the upload
    pub business_name: String,
    /// Original filename
    pub filename: String,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the record last changed
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// A freshly queued record
    pub fn queued(
        task_id: TaskId,
        client_id: impl Into<String>,
        business_name: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            status: TaskStatus::Queued,
            progress: 0,
            message: "File received, queued for processing".to_string(),
            total_rows: 0,
            processed_rows: 0,
            current_batch: 0,
            total_batches: 0,
            failed_batches: 0,
            collection_name: None,
            processing_time_seconds: None,
            error_detail: None,
            client_id: client_id.into(),
            business_name: business_name.into(),
            filename: filename.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One source row: column name to cleaned value, plus [`ID_FIELD`]
///
/// Fields keep the source column order. Replacing an existing field keeps its
/// position; new fields are appended.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(pub(crate) Map<String, Value>);

impl Document {
    /// Set a field, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), Value::String(value.into()));
    }

    /// Look up a field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Field names in column order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The synthetic identifier
    pub fn id(&self) -> Option<&str> {
        self.get(ID_FIELD)
    }

    /// Number of fields, including the identifier
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the document has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Value::String(v.into())))
                .collect(),
        )
    }
}

/// Ordered, non-empty group of documents forwarded in one call
pub type Batch = Vec<Document>;

/// Task lifecycle events, broadcast after every registry transition
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A task was registered
    TaskQueued {
        /// Task identifier
        task_id: TaskId,
        /// Uploaded filename
        filename: String,
    },
    /// The run started or finished a batch
    TaskProgress {
        /// Task identifier
        task_id: TaskId,
        /// Estimated progress (0-99)
        progress: u8,
        /// Batches produced so far
        current_batch: u64,
        /// Rows read so far
        total_rows: u64,
    },
    /// The run reached `completed` or `completed_with_errors`
    TaskCompleted {
        /// Task identifier
        task_id: TaskId,
        /// Final status
        status: TaskStatus,
        /// Rows forwarded
        total_rows: u64,
        /// Batches rejected by the document store
        failed_batches: u64,
    },
    /// The run reached `failed`
    TaskFailed {
        /// Task identifier
        task_id: TaskId,
        /// Failure reason
        error: String,
    },
}

impl Event {
    /// Task the event refers to
    pub fn task_id(&self) -> TaskId {
        match self {
            Event::TaskQueued { task_id, .. }
            | Event::TaskProgress { task_id, .. }
            | Event::TaskCompleted { task_id, .. }
            | Event::TaskFailed { task_id, .. } => *task_id,
        }
    }
}
