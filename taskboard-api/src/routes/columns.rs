/// Column endpoints
///
/// New columns are appended after the board's last column; deleting a
/// column shifts the ones after it down by one.

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
    models::{board::Board, column::Column},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateColumnRequest {
    pub board_id: Uuid,

    #[validate(length(min = 3, max = 50, message = "Name must be between 3 and 50 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateColumnRequest {
    #[validate(length(min = 3, max = 50, message = "Name must be between 3 and 50 characters"))]
    pub name: String,
}

fn column_not_found() -> ApiError {
    ApiError::NotFound("Column not found".to_string())
}

/// `GET /v1/columns`
pub async fn list_columns(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Column>>> {
    Ok(Json(Column::list_by_owner(&state.db, auth.user_id).await?))
}

/// `POST /v1/columns`
pub async fn create_column(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateColumnRequest>,
) -> ApiResult<(StatusCode, Json<Column>)> {
    req.validate()?;

    let board = Board::find_by_id_and_owner(&state.db, req.board_id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Board not found".to_string()))?;

    let mut tx = begin(&state.db, state.config.database.consistency).await?;
    let column = Column::append(&mut *tx, board.id, req.name.trim()).await?;
    tx.commit().await?;

    tracing::info!(column_id = %column.id, board_id = %board.id, position = column.position, "Column created");
    Ok((StatusCode::CREATED, Json(column)))
}

/// `GET /v1/columns/:id`
pub async fn show_column(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Column>> {
    let column = Column::find_by_id_and_owner(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(column_not_found)?;

    Ok(Json(column))
}

/// `PUT /v1/columns/:id`; renames, position is unchanged
pub async fn update_column(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateColumnRequest>,
) -> ApiResult<Json<Column>> {
    req.validate()?;

    let column = Column::find_by_id_and_owner(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(column_not_found)?;

    let column = Column::rename(&state.db, column.id, req.name.trim()).await?;
    Ok(Json(column))
}

/// `DELETE /v1/columns/:id`
pub async fn delete_column(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut tx = begin(&state.db, state.config.database.consistency).await?;
    Column::delete(&mut *tx, auth.user_id, id).await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_rules() {
        let req = CreateColumnRequest {
            board_id: Uuid::new_v4(),
            name: "QA".to_string(),
        };
        assert!(req.validate().is_err());

        let req = UpdateColumnRequest {
            name: "In review".to_string(),
        };
        assert!(req.validate().is_ok());
    }
}
