/// Tag endpoints
///
/// Tags belong to the caller; names and colors are unique per owner.
/// Attaching an already-attached tag, or detaching one that is not
/// attached, is a `409`.

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
    models::{tag::Tag, task::Task},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct TagRequest {
    #[validate(length(min = 3, max = 255, message = "Name must be between 3 and 255 characters"))]
    pub name: String,

    #[validate(length(min = 3, max = 255, message = "Color must be between 3 and 255 characters"))]
    pub color: String,
}

fn tag_not_found() -> ApiError {
    ApiError::NotFound("Tag not found".to_string())
}

/// `GET /v1/tags`
pub async fn list_tags(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(Tag::list_by_owner(&state.db, auth.user_id).await?))
}

/// `POST /v1/tags`
pub async fn create_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<TagRequest>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    req.validate()?;

    let tag = Tag::create(&state.db, auth.user_id, req.name.trim(), req.color.trim()).await?;

    tracing::info!(tag_id = %tag.id, "Tag created");
    Ok((StatusCode::CREATED, Json(tag)))
}

/// `PUT /v1/tags/:id`
pub async fn update_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<TagRequest>,
) -> ApiResult<Json<Tag>> {
    req.validate()?;

    let tag = Tag::find_by_id_and_owner(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(tag_not_found)?;

    Ok(Json(
        Tag::update(&state.db, tag.id, req.name.trim(), req.color.trim()).await?,
    ))
}

/// `DELETE /v1/tags/:id`
pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let tag = Tag::find_by_id_and_owner(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(tag_not_found)?;

    Tag::delete(&state.db, tag.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Resolves both sides of a task-tag link for the caller
async fn owned_pair(
    state: &AppState,
    owner_id: Uuid,
    task_id: Uuid,
    tag_id: Uuid,
) -> ApiResult<(Task, Tag)> {
    let task = Task::find_by_id_and_owner(&state.db, task_id, owner_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    let tag = Tag::find_by_id_and_owner(&state.db, tag_id, owner_id)
        .await?
        .ok_or_else(tag_not_found)?;

    Ok((task, tag))
}

/// `POST /v1/tasks/:id/tags/:tag_id`; returns the task's tags
pub async fn attach_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((task_id, tag_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Tag>>> {
    let (task, tag) = owned_pair(&state, auth.user_id, task_id, tag_id).await?;

    Tag::attach(&state.db, task.id, tag.id).await?;
    Ok(Json(Tag::list_for_task(&state.db, task.id).await?))
}

/// `DELETE /v1/tasks/:id/tags/:tag_id`; returns the task's tags
pub async fn detach_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((task_id, tag_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Tag>>> {
    let (task, tag) = owned_pair(&state, auth.user_id, task_id, tag_id).await?;

    Tag::detach(&state.db, task.id, tag.id).await?;
    Ok(Json(Tag::list_for_task(&state.db, task.id).await?))
}
