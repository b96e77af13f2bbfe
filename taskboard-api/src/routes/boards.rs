/// Board endpoints
///
/// Opening a board (`GET /v1/boards/:id`) makes it the owner's active
/// board. `PUT` reconciles the submitted column list against the stored
/// one: columns sent with their `id` keep it, new ones are created, and
/// columns left out are deleted together with their tasks. A `PUT` without
/// `columns` removes every column.

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
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    activation::{self, CreateBoard, UpdateBoard},
    auth::middleware::AuthContext,
    models::board::{Board, BoardRelations, BoardWithRelations},
    ordering::reconcile::{ColumnFields, Submitted},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Comma separated relations, e.g. `columns,user`
    pub with: Option<String>,
}

impl ListQuery {
    fn relations(&self) -> BoardRelations {
        self.with
            .as_deref()
            .map(|w| w.parse().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct NewColumn {
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBoardRequest {
    #[validate(length(min = 3, max = 50, message = "Name must be between 3 and 50 characters"))]
    pub name: String,

    /// Initial columns in display order
    #[serde(default)]
    pub columns: Vec<NewColumn>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBoardRequest {
    #[validate(length(min = 3, max = 50, message = "Name must be between 3 and 50 characters"))]
    pub name: Option<String>,

    pub is_active: Option<bool>,

    /// Full desired column list; omitted means "no columns"
    pub columns: Option<Vec<Submitted<ColumnFields>>>,
}

#[derive(Debug, Serialize)]
pub struct DeleteBoardResponse {
    pub deleted: Uuid,

    /// Board that became active in place of the deleted one
    pub promoted: Option<Board>,
}

fn validate_columns<'a>(names: impl Iterator<Item = &'a str> + Clone) -> ApiResult<()> {
    for (index, name) in names.clone().enumerate() {
        check_name_length(&format!("columns.{}.name", index), name, 3, 50)?;
    }
    ensure_unique_names("columns", names)
}

/// Loads a single board with its full column tree
async fn with_columns(state: &AppState, board: Board) -> ApiResult<BoardWithRelations> {
    let relations = BoardRelations {
        columns: true,
        user: false,
    };

    Board::load_relations(&state.db, vec![board], relations)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::InternalError("Board vanished while loading relations".to_string()))
}

/// `GET /v1/boards?with=columns,user`
pub async fn list_boards(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<BoardWithRelations>>> {
    let boards = Board::list_by_owner(&state.db, auth.user_id).await?;
    let boards = Board::load_relations(&state.db, boards, query.relations()).await?;

    Ok(Json(boards))
}

/// `POST /v1/boards`
pub async fn create_board(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateBoardRequest>,
) -> ApiResult<(StatusCode, Json<BoardWithRelations>)> {
    req.validate()?;
    validate_columns(req.columns.iter().map(|c| c.name.as_str()))?;

    let board = activation::create_with_activation(
        &state.db,
        &state.activation_policy(),
        auth.user_id,
        CreateBoard {
            name: req.name.trim().to_string(),
            columns: req.columns.into_iter().map(|c| c.name.trim().to_string()).collect(),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(with_columns(&state, board).await?)))
}

/// `GET /v1/boards/active`
pub async fn active_board(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<BoardWithRelations>> {
    let board = activation::get_active(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active board".to_string()))?;

    Ok(Json(with_columns(&state, board).await?))
}

/// `GET /v1/boards/:id`; activates the board
pub async fn show_board(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BoardWithRelations>> {
    let board = activation::activate(&state.db, &state.activation_policy(), auth.user_id, id).await?;

    Ok(Json(with_columns(&state, board).await?))
}

/// `PATCH /v1/boards/:id/activate`
pub async fn activate_board(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Board>> {
    let board = activation::activate(&state.db, &state.activation_policy(), auth.user_id, id).await?;

    Ok(Json(board))
}

/// `PUT /v1/boards/:id`
pub async fn update_board(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBoardRequest>,
) -> ApiResult<Json<BoardWithRelations>> {
    req.validate()?;
    if let Some(columns) = &req.columns {
        validate_columns(columns.iter().map(|c| c.fields.name.as_str()))?;
    }

    let columns = req.columns.map(|columns| {
        columns
            .into_iter()
            .map(|c| Submitted {
                id: c.id,
                fields: ColumnFields {
                    name: c.fields.name.trim().to_string(),
                },
            })
            .collect()
    });

    let board = activation::update_board(
        &state.db,
        &state.activation_policy(),
        auth.user_id,
        id,
        UpdateBoard {
            name: req.name.map(|n| n.trim().to_string()),
            is_active: req.is_active,
            columns,
        },
    )
    .await?;

    Ok(Json(with_columns(&state, board).await?))
}

/// `DELETE /v1/boards/:id`
pub async fn delete_board(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteBoardResponse>> {
    let outcome =
        activation::delete_board(&state.db, &state.activation_policy(), auth.user_id, id).await?;

    Ok(Json(DeleteBoardResponse {
        deleted: outcome.deleted.id,
        promoted: outcome.promoted,
    }))
}
