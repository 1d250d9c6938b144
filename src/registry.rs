//! In-memory task status registry

use crate::types::{TaskId, TaskRecord};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Concurrent map from task id to its latest status record
///
/// Cloning is cheap and every clone shares the same map. Records are created once
/// and never removed. A patch runs entirely under the write lock, so readers only
/// ever observe complete records. Once a record is terminal further patches are
/// dropped.
#[derive(Clone, Debug, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<TaskId, TaskRecord>>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record and return its id
    pub async fn create(&self, record: TaskRecord) -> TaskId {
        let id = record.task_id;
        self.tasks.write().await.insert(id, record);
        id
    }

    /// Snapshot of a record
    pub async fn get(&self, id: TaskId) -> Option<TaskRecord> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// Apply `patch` to a record and return the updated snapshot
    ///
    /// Returns `None` for unknown ids. A record already in a terminal state is left
    /// untouched and its current snapshot is returned.
    pub async fn update<F>(&self, id: TaskId, patch: F) -> Option<TaskRecord>
    where
        F: FnOnce(&mut TaskRecord),
    {
        let mut tasks = self.tasks.write().await;
        let record = tasks.get_mut(&id)?;

        if record.status.is_terminal() {
            tracing::warn!(
                task_id = %id,
                status = %record.status,
                "ignoring update to finished task"
            );
            return Some(record.clone());
        }

        patch(record);
        record.updated_at = Utc::now();
        Some(record.clone())
    }

    /// Number of tracked tasks
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Whether no task has been created yet
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
