/// Task model and database operations
///
/// Tasks form a dense 0-based ordered set within their column. `status` is
/// not stored: every read joins the owning column and reports its current
/// name, so a move can never leave a stale status behind.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     column_id UUID NOT NULL REFERENCES board_columns(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     description VARCHAR(255),
///     due_date TIMESTAMPTZ,
///     position INTEGER NOT NULL CHECK (position >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::models::task::Task;
/// # async fn example(pool: sqlx::PgPool, owner_id: uuid::Uuid, task_id: uuid::Uuid) -> Result<(), sqlx::Error> {
/// if let Some(task) = Task::find_by_id_and_owner(&pool, task_id, owner_id).await? {
///     println!("{} is in {}", task.name, task.status);
/// }
/// # Ok(())
/// # }
/// ```

use crate::db::transaction::begin;
use crate::error::{CoreError, CoreResult};
use crate::models::column::Column;
use crate::models::subtask::Subtask;
use crate::models::tag::Tag;
use crate::ordering::reconcile::{reconcile, SubtaskFields, Submitted, TaskSubtasks};
use crate::ordering::{OrderingPolicy, TASKS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

/// Projection shared by every task read; `status` comes from the column
const TASK_SELECT: &str = r#"
    SELECT t.id, t.column_id, t.name, t.description, t.due_date, t.position,
           c.name AS status, t.created_at, t.updated_at
    FROM tasks t
    JOIN board_columns c ON c.id = t.column_id
    JOIN boards b ON b.id = c.board_id
"#;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub column_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,

    /// 0-based position within the column
    pub position: i32,

    /// Name of the owning column, derived at read time
    pub status: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task with its subtasks and tags, as returned by single-task endpoints
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<Subtask>,
    pub tags: Vec<Tag>,
}

impl TaskDetail {
    pub async fn load(pool: &PgPool, task: Task) -> Result<Self, sqlx::Error> {
        let subtasks = Subtask::list_by_task(pool, task.id).await?;
        let tags = Tag::list_for_task(pool, task.id).await?;

        Ok(Self {
            task,
            subtasks,
            tags,
        })
    }
}

/// Input for creating a task; it is appended to the column
#[derive(Debug, Clone, Default)]
pub struct CreateTask {
    pub column_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Scalar fields of a task update; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub name: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Subtask submitted together with a new task
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewSubtask {
    pub name: String,

    #[serde(default, alias = "is_completed")]
    pub completed: bool,
}

/// Rejects `name` when the policy requires unique names per column
async fn check_name_policy(
    conn: impl PgExecutor<'_>,
    policy: &OrderingPolicy,
    column: &Column,
    name: &str,
    except_id: Uuid,
) -> CoreResult<()> {
    if policy.unique_task_names_per_column
        && Task::name_taken_in_column(conn, column.id, name, except_id).await?
    {
        warn!(column_id = %column.id, "Duplicate task name rejected");
        return Err(CoreError::Conflict(format!(
            "A task named '{}' already exists in column '{}'",
            name, column.name
        )));
    }
    Ok(())
}

impl Task {
    /// Appends a task at the end of its column
    pub async fn append(conn: &mut PgConnection, data: &CreateTask) -> Result<Self, sqlx::Error> {
        let position = TASKS.next_position(&mut *conn, data.column_id).await?;

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tasks (column_id, name, description, due_date, position)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(data.column_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.due_date)
        .bind(position)
        .fetch_one(&mut *conn)
        .await?;

        Self::find_by_id(&mut *conn, id).await
    }

    /// Re-reads a task by id, without an ownership check
    pub async fn find_by_id(conn: impl PgExecutor<'_>, id: Uuid) -> Result<Self, sqlx::Error> {
        let sql = format!("{} WHERE t.id = $1", TASK_SELECT);

        sqlx::query_as::<_, Task>(&sql).bind(id).fetch_one(conn).await
    }

    /// Finds a task whose board belongs to `owner_id`
    pub async fn find_by_id_and_owner(
        conn: impl PgExecutor<'_>,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("{} WHERE t.id = $1 AND b.owner_id = $2", TASK_SELECT);

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(conn)
            .await
    }

    /// Lists an owner's tasks, optionally restricted to one column
    pub async fn list_by_owner(
        conn: impl PgExecutor<'_>,
        owner_id: Uuid,
        column_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "{} WHERE b.owner_id = $1 AND ($2::UUID IS NULL OR t.column_id = $2) \
             ORDER BY c.board_id, c.position, t.position",
            TASK_SELECT
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(owner_id)
            .bind(column_id)
            .fetch_all(conn)
            .await
    }

    /// Tasks of several columns, grouped by column then position
    pub async fn list_by_columns(
        conn: impl PgExecutor<'_>,
        column_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "{} WHERE t.column_id = ANY($1) ORDER BY t.column_id, t.position",
            TASK_SELECT
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(column_ids)
            .fetch_all(conn)
            .await
    }

    /// Whether the column holds another task with this name
    pub async fn name_taken_in_column(
        conn: impl PgExecutor<'_>,
        column_id: Uuid,
        name: &str,
        except_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM tasks WHERE column_id = $1 AND name = $2 AND id <> $3)",
        )
        .bind(column_id)
        .bind(name)
        .bind(except_id)
        .fetch_one(conn)
        .await
    }

    /// Updates scalar fields; position and column are left to the ordering core
    pub async fn update_fields(
        conn: &mut PgConnection,
        id: Uuid,
        data: &UpdateTask,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                due_date = COALESCE($4, due_date),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.due_date)
        .execute(&mut *conn)
        .await?;

        Self::find_by_id(&mut *conn, id).await
    }

    /// Moves the row to a column and position without touching siblings
    pub(crate) async fn place(
        conn: impl PgExecutor<'_>,
        id: Uuid,
        column_id: Uuid,
        position: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks SET column_id = $2, position = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(column_id)
        .bind(position)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Creates a task at the end of its column with initial subtasks and tags
    ///
    /// Subtasks take their index as position. All rows are written in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// `NotFound` if the column or any tag is missing or foreign; `Conflict`
    /// if the name policy rejects the name.
    pub async fn create_with_subtasks(
        pool: &PgPool,
        policy: &OrderingPolicy,
        owner_id: Uuid,
        data: &CreateTask,
        subtasks: &[NewSubtask],
        tag_ids: &[Uuid],
    ) -> CoreResult<TaskDetail> {
        let column = Column::find_by_id_and_owner(pool, data.column_id, owner_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Column"))?;

        check_name_policy(pool, policy, &column, &data.name, Uuid::nil()).await?;
        Tag::ensure_owned(pool, owner_id, tag_ids).await?;

        let mut tx = begin(pool, policy.consistency).await?;

        let task = Self::append(&mut *tx, data).await?;
        for (position, subtask) in subtasks.iter().enumerate() {
            Subtask::insert(
                &mut *tx,
                task.id,
                &subtask.name,
                subtask.completed,
                position as i32,
            )
            .await?;
        }
        Tag::sync_for_task(&mut *tx, task.id, tag_ids).await?;

        tx.commit().await?;

        info!(
            task_id = %task.id,
            column_id = %task.column_id,
            position = task.position,
            subtasks = subtasks.len(),
            "Task created"
        );
        Ok(TaskDetail::load(pool, task).await?)
    }

    /// Updates scalar fields, reconciles subtasks and optionally replaces tags
    ///
    /// `subtasks: None` removes every subtask, like an empty list.
    /// `tag_ids: None` leaves the tag set alone.
    pub async fn update_with_subtasks(
        pool: &PgPool,
        policy: &OrderingPolicy,
        owner_id: Uuid,
        id: Uuid,
        data: &UpdateTask,
        subtasks: Option<Vec<Submitted<SubtaskFields>>>,
        tag_ids: Option<&[Uuid]>,
    ) -> CoreResult<TaskDetail> {
        let task = Self::find_by_id_and_owner(pool, id, owner_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Task"))?;

        if let Some(name) = data.name.as_deref().filter(|n| *n != task.name) {
            let column = Column::find_by_id_and_owner(pool, task.column_id, owner_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Column"))?;
            check_name_policy(pool, policy, &column, name, task.id).await?;
        }
        if let Some(tag_ids) = tag_ids {
            Tag::ensure_owned(pool, owner_id, tag_ids).await?;
        }

        let mut tx = begin(pool, policy.consistency).await?;

        let task = Self::update_fields(&mut *tx, task.id, data).await?;
        let outcome = reconcile(&mut *tx, &TaskSubtasks { task_id: task.id }, subtasks).await?;
        if let Some(tag_ids) = tag_ids {
            Tag::sync_for_task(&mut *tx, task.id, tag_ids).await?;
        }

        tx.commit().await?;

        info!(
            task_id = %task.id,
            subtasks_created = outcome.created.len(),
            subtasks_deleted = outcome.deleted_ids.len(),
            "Task updated"
        );
        Ok(TaskDetail::load(pool, task).await?)
    }

    /// Deletes a task and closes the gap in its column
    pub async fn delete(conn: &mut PgConnection, owner_id: Uuid, id: Uuid) -> CoreResult<Task> {
        let task = Self::find_by_id_and_owner(&mut *conn, id, owner_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Task"))?;

        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        TASKS.close_gap(&mut *conn, task.column_id, task.position).await?;

        info!(task_id = %id, column_id = %task.column_id, "Task deleted");
        Ok(task)
    }
}
