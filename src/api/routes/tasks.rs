//! Task status handler.

use crate::api::AppState;
use crate::error::Error;
use crate::types::{TaskId, TaskRecord};
use axum::{
    Json,
    extract::{Path, State},
};

/// GET /bulk-load-data/status/:task_id - Current status of a task
///
/// A malformed id is reported the same way as an unknown one.
#[utoipa::path(
    get,
    path = "/bulk-load-data/status/{task_id}",
    tag = "bulk-load",
    params(
        ("task_id" = String, Path, description = "Task ID returned by the upload")
    ),
    responses(
        (status = 200, description = "Task status record", body = TaskRecord),
        (status = 404, description = "Task not found", body = crate::error::ApiError)
    )
)]
pub async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskRecord>, Error> {
    let id: TaskId = task_id
        .parse()
        .map_err(|_| Error::NotFound(task_id.clone()))?;

    let record = state.orchestrator.require_status(id).await?;
    Ok(Json(record))
}
