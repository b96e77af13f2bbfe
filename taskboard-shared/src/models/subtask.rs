/// Subtask model
///
/// Subtasks form a dense 0-based ordered set within their task. Standalone
/// creation appends; bulk changes go through `ordering::reconcile` and
/// `ordering::reorder`.

use crate::error::{CoreError, CoreResult};
use crate::ordering::SUBTASKS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use tracing::info;
use uuid::Uuid;

const SUBTASK_FIELDS: &str =
    "s.id, s.task_id, s.name, s.position, s.completed, s.created_at, s.updated_at";

/// Ownership is resolved through task -> column -> board
const OWNED_JOIN: &str = "JOIN tasks t ON t.id = s.task_id \
     JOIN board_columns c ON c.id = t.column_id \
     JOIN boards b ON b.id = c.board_id";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: Uuid,
    pub name: String,

    /// 0-based position within the task
    pub position: i32,

    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct UpdateSubtask {
    pub name: Option<String>,
    pub completed: Option<bool>,
}

impl Subtask {
    pub async fn insert(
        conn: impl PgExecutor<'_>,
        task_id: Uuid,
        name: &str,
        completed: bool,
        position: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Subtask>(
            r#"
            INSERT INTO subtasks (task_id, name, completed, position)
            VALUES ($1, $2, $3, $4)
            RETURNING id, task_id, name, position, completed, created_at, updated_at
            "#,
        )
        .bind(task_id)
        .bind(name)
        .bind(completed)
        .bind(position)
        .fetch_one(conn)
        .await
    }

    /// Appends a subtask at `max(position) + 1`
    pub async fn append(
        conn: &mut PgConnection,
        task_id: Uuid,
        name: &str,
        completed: bool,
    ) -> Result<Self, sqlx::Error> {
        let position = SUBTASKS.next_position(&mut *conn, task_id).await?;
        Self::insert(&mut *conn, task_id, name, completed, position).await
    }

    /// Rewrites name and position in place, and `completed` when given;
    /// identity is preserved. An unchanged row is not written.
    pub async fn replace(
        conn: impl PgExecutor<'_>,
        id: Uuid,
        name: &str,
        completed: Option<bool>,
        position: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Subtask>(
            r#"
            WITH changed AS (
                UPDATE subtasks
                SET name = $2, completed = COALESCE($3, completed), position = $4, updated_at = NOW()
                WHERE id = $1
                  AND (name, completed, position)
                      IS DISTINCT FROM ($2::TEXT, COALESCE($3::BOOLEAN, completed), $4::INT4)
                RETURNING id, task_id, name, position, completed, created_at, updated_at
            )
            SELECT id, task_id, name, position, completed, created_at, updated_at FROM changed
            UNION ALL
            SELECT id, task_id, name, position, completed, created_at, updated_at
            FROM subtasks
            WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM changed)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(completed)
        .bind(position)
        .fetch_one(conn)
        .await
    }

    pub async fn update(
        conn: impl PgExecutor<'_>,
        id: Uuid,
        data: &UpdateSubtask,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Subtask>(
            r#"
            UPDATE subtasks
            SET name = COALESCE($2, name),
                completed = COALESCE($3, completed),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, task_id, name, position, completed, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.completed)
        .fetch_one(conn)
        .await
    }

    /// Flips the completion flag
    pub async fn toggle_completion(conn: impl PgExecutor<'_>, id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Subtask>(
            r#"
            UPDATE subtasks
            SET completed = NOT completed, updated_at = NOW()
            WHERE id = $1
            RETURNING id, task_id, name, position, completed, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_one(conn)
        .await
    }

    /// Finds a subtask whose board belongs to `owner_id`
    pub async fn find_by_id_and_owner(
        conn: impl PgExecutor<'_>,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM subtasks s {} WHERE s.id = $1 AND b.owner_id = $2",
            SUBTASK_FIELDS, OWNED_JOIN
        );

        sqlx::query_as::<_, Subtask>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(conn)
            .await
    }

    /// Subtasks of one task in position order
    pub async fn list_by_task(conn: impl PgExecutor<'_>, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM subtasks s WHERE s.task_id = $1 ORDER BY s.position",
            SUBTASK_FIELDS
        );

        sqlx::query_as::<_, Subtask>(&sql)
            .bind(task_id)
            .fetch_all(conn)
            .await
    }

    /// Subtasks of several tasks, grouped by task then position
    pub async fn list_by_tasks(
        conn: impl PgExecutor<'_>,
        task_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM subtasks s WHERE s.task_id = ANY($1) ORDER BY s.task_id, s.position",
            SUBTASK_FIELDS
        );

        sqlx::query_as::<_, Subtask>(&sql)
            .bind(task_ids)
            .fetch_all(conn)
            .await
    }

    /// Deletes a subtask and closes the gap in its task
    pub async fn delete(conn: &mut PgConnection, owner_id: Uuid, id: Uuid) -> CoreResult<Subtask> {
        let subtask = Self::find_by_id_and_owner(&mut *conn, id, owner_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Subtask"))?;

        sqlx::query("DELETE FROM subtasks WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        SUBTASKS
            .close_gap(&mut *conn, subtask.task_id, subtask.position)
            .await?;

        info!(subtask_id = %id, task_id = %subtask.task_id, "Subtask deleted");
        Ok(subtask)
    }
}
