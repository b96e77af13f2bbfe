/// Subtask endpoints
///
/// Standalone creation appends to the task; deletion closes the gap.
/// `PATCH /v1/subtasks/bulk-reorder` applies several position changes to
/// one task's subtasks atomically: one bad entry rejects the whole batch.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use taskboard_shared::{
    auth::middleware::AuthContext,
    db::transaction::begin,
    models::{
        subtask::{Subtask, UpdateSubtask},
        task::Task,
    },
    ordering::reorder::{bulk_reorder_subtasks, SubtaskPosition},
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubtaskRequest {
    pub task_id: Uuid,

    #[validate(length(min = 3, max = 255, message = "Name must be between 3 and 255 characters"))]
    pub name: String,

    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSubtaskRequest {
    #[validate(length(min = 3, max = 255, message = "Name must be between 3 and 255 characters"))]
    pub name: Option<String>,

    #[serde(alias = "is_completed")]
    pub completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BulkReorderRequest {
    #[serde(alias = "taskId")]
    pub task_id: Uuid,

    #[serde(alias = "subtasks")]
    pub entries: Vec<SubtaskPosition>,
}

fn subtask_not_found() -> ApiError {
    ApiError::NotFound("Subtask not found".to_string())
}

/// `POST /v1/subtasks`
pub async fn create_subtask(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateSubtaskRequest>,
) -> ApiResult<(StatusCode, Json<Subtask>)> {
    req.validate()?;

    let task = Task::find_by_id_and_owner(&state.db, req.task_id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    let mut tx = begin(&state.db, state.config.database.consistency).await?;
    let subtask = Subtask::append(&mut *tx, task.id, req.name.trim(), req.completed).await?;
    tx.commit().await?;

    info!(subtask_id = %subtask.id, task_id = %task.id, position = subtask.position, "Subtask created");
    Ok((StatusCode::CREATED, Json(subtask)))
}

/// `PUT /v1/subtasks/:id`
pub async fn update_subtask(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSubtaskRequest>,
) -> ApiResult<Json<Subtask>> {
    req.validate()?;

    let subtask = Subtask::find_by_id_and_owner(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(subtask_not_found)?;

    let data = UpdateSubtask {
        name: req.name.map(|n| n.trim().to_string()),
        completed: req.completed,
    };

    Ok(Json(Subtask::update(&state.db, subtask.id, &data).await?))
}

/// `DELETE /v1/subtasks/:id`
pub async fn delete_subtask(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut tx = begin(&state.db, state.config.database.consistency).await?;
    Subtask::delete(&mut *tx, auth.user_id, id).await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `PATCH /v1/subtasks/:id/toggle-completion`
pub async fn toggle_completion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Subtask>> {
    let subtask = Subtask::find_by_id_and_owner(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(subtask_not_found)?;

    Ok(Json(Subtask::toggle_completion(&state.db, subtask.id).await?))
}

/// `PATCH /v1/subtasks/bulk-reorder`
///
/// Returns the task's subtasks in their new order.
pub async fn bulk_reorder(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<BulkReorderRequest>,
) -> ApiResult<Json<Vec<Subtask>>> {
    let subtasks = bulk_reorder_subtasks(
        &state.db,
        &state.ordering_policy(),
        auth.user_id,
        req.task_id,
        &req.entries,
    )
    .await?;

    Ok(Json(subtasks))
}
