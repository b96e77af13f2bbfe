/// Task endpoints
///
/// - `POST /v1/tasks` appends to the column, with optional subtasks and tags
/// - `PUT /v1/tasks/:id` reconciles the submitted subtask list (an omitted
///   list removes every subtask) and replaces tags when `tags` is present
/// - `PUT /v1/tasks/:id/reorder` moves within the column
/// - `PUT /v1/tasks/:id/move` moves to a position in any owned column
///
/// Positions are 0-based. A reorder or move to the current slot succeeds
/// without writing anything.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{check_name_length, ensure_unique_names},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::middleware::AuthContext,
    db::transaction::begin,
    models::task::{CreateTask, NewSubtask, Task, TaskDetail, UpdateTask},
    ordering::{
        mover::{self, MoveTarget},
        reconcile::{SubtaskFields, Submitted},
        reorder,
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub column_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    pub column_id: Uuid,

    #[validate(length(min = 3, max = 255, message = "Name must be between 3 and 255 characters"))]
    pub name: String,

    #[validate(length(max = 255, message = "Description must be at most 255 characters"))]
    pub description: Option<String>,

    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub subtasks: Vec<NewSubtask>,

    /// Tag ids; every tag must belong to the caller
    #[serde(default)]
    pub tags: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 3, max = 255, message = "Name must be between 3 and 255 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 255, message = "Description must be at most 255 characters"))]
    pub description: Option<String>,

    pub due_date: Option<DateTime<Utc>>,

    pub subtasks: Option<Vec<Submitted<SubtaskFields>>>,

    pub tags: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    #[serde(alias = "new_order", alias = "position")]
    pub new_position: i32,
}

/// Reorder and move response
#[derive(Debug, Serialize)]
pub struct PositionResponse {
    pub task: Task,

    /// `false` when the task was already in place
    pub changed: bool,
}

fn validate_subtask_names<'a>(names: impl Iterator<Item = &'a str> + Clone) -> ApiResult<()> {
    for (index, name) in names.clone().enumerate() {
        check_name_length(&format!("subtasks.{}.name", index), name, 3, 255)?;
    }
    ensure_unique_names("subtasks", names)
}

/// `GET /v1/tasks?column_id=`
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(
        Task::list_by_owner(&state.db, auth.user_id, query.column_id).await?,
    ))
}

/// `POST /v1/tasks`
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskDetail>)> {
    req.validate()?;
    validate_subtask_names(req.subtasks.iter().map(|s| s.name.as_str()))?;

    let subtasks: Vec<NewSubtask> = req
        .subtasks
        .into_iter()
        .map(|s| NewSubtask {
            name: s.name.trim().to_string(),
            completed: s.completed,
        })
        .collect();

    let data = CreateTask {
        column_id: req.column_id,
        name: req.name.trim().to_string(),
        description: req.description,
        due_date: req.due_date,
    };

    let detail = Task::create_with_subtasks(
        &state.db,
        &state.ordering_policy(),
        auth.user_id,
        &data,
        &subtasks,
        &req.tags,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

/// `GET /v1/tasks/:id`
pub async fn show_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskDetail>> {
    let task = Task::find_by_id_and_owner(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    Ok(Json(TaskDetail::load(&state.db, task).await?))
}

/// `PUT /v1/tasks/:id`
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskDetail>> {
    req.validate()?;
    if let Some(subtasks) = &req.subtasks {
        validate_subtask_names(subtasks.iter().map(|s| s.fields.name.as_str()))?;
    }

    let subtasks = req.subtasks.map(|subtasks| {
        subtasks
            .into_iter()
            .map(|s| Submitted {
                id: s.id,
                fields: SubtaskFields {
                    name: s.fields.name.trim().to_string(),
                    completed: s.fields.completed,
                },
            })
            .collect()
    });

    let data = UpdateTask {
        name: req.name.map(|n| n.trim().to_string()),
        description: req.description,
        due_date: req.due_date,
    };

    let detail = Task::update_with_subtasks(
        &state.db,
        &state.ordering_policy(),
        auth.user_id,
        id,
        &data,
        subtasks,
        req.tags.as_deref(),
    )
    .await?;

    Ok(Json(detail))
}

/// `DELETE /v1/tasks/:id`
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut tx = begin(&state.db, state.config.database.consistency).await?;
    Task::delete(&mut *tx, auth.user_id, id).await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /v1/tasks/:id/reorder`
pub async fn reorder_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<Json<PositionResponse>> {
    let outcome = reorder::reorder_task(
        &state.db,
        &state.ordering_policy(),
        auth.user_id,
        id,
        req.new_position,
    )
    .await?;

    let changed = !outcome.is_noop();
    Ok(Json(PositionResponse {
        task: outcome.into_inner(),
        changed,
    }))
}

/// `PUT /v1/tasks/:id/move`
pub async fn move_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(target): Json<MoveTarget>,
) -> ApiResult<Json<PositionResponse>> {
    let outcome =
        mover::move_task(&state.db, &state.ordering_policy(), auth.user_id, id, target).await?;

    let changed = !outcome.is_noop();
    Ok(Json(PositionResponse {
        task: outcome.into_task(),
        changed,
    }))
}
