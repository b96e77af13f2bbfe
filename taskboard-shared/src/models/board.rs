/// Board model and database operations
///
/// A board belongs to one owner and holds an ordered set of columns. At most
/// one board per owner is active; the schema enforces this with a deferred
/// exclusion constraint and `crate::activation` performs the transitions.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE boards (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     name VARCHAR(50) NOT NULL,
///     is_active BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT boards_owner_name_key UNIQUE (owner_id, name),
///     CONSTRAINT boards_single_active_per_owner
///         EXCLUDE USING btree (owner_id WITH =) WHERE (is_active)
///         DEFERRABLE INITIALLY DEFERRED
/// );
/// ```

use crate::models::column::Column;
use crate::models::subtask::Subtask;
use crate::models::task::Task;
use crate::models::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

const BOARD_COLUMNS: &str = "id, owner_id, name, is_active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Board {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,

    /// At most one board per owner has this set
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Relations that can be eager-loaded with a board listing
///
/// Parsed from the `with` query parameter, e.g. `with=columns,user`.
/// `columns` loads columns with their tasks and subtasks; `user` loads the
/// owner. Unknown names are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardRelations {
    pub columns: bool,
    pub user: bool,
}

impl FromStr for BoardRelations {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut relations = BoardRelations::default();
        for part in s.split(',').map(str::trim) {
            match part {
                "columns" | "columns.tasks" | "columns.tasks.subtasks" => relations.columns = true,
                "user" => relations.user = true,
                _ => {}
            }
        }
        Ok(relations)
    }
}

/// Task with its subtasks, used in eager-loaded board trees
#[derive(Debug, Clone, Serialize)]
pub struct TaskTree {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<Subtask>,
}

/// Column with its tasks, used in eager-loaded board trees
#[derive(Debug, Clone, Serialize)]
pub struct ColumnTree {
    #[serde(flatten)]
    pub column: Column,
    pub tasks: Vec<TaskTree>,
}

/// Board plus the relations requested through [`BoardRelations`]
#[derive(Debug, Clone, Serialize)]
pub struct BoardWithRelations {
    #[serde(flatten)]
    pub board: Board,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnTree>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Board {
    /// Inserts a board row; activation side effects are the caller's job
    pub async fn insert(
        conn: impl PgExecutor<'_>,
        owner_id: Uuid,
        name: &str,
        is_active: bool,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO boards (owner_id, name, is_active) VALUES ($1, $2, $3) RETURNING {}",
            BOARD_COLUMNS
        );

        sqlx::query_as::<_, Board>(&sql)
            .bind(owner_id)
            .bind(name)
            .bind(is_active)
            .fetch_one(conn)
            .await
    }

    /// Finds a board only if it belongs to `owner_id`
    pub async fn find_by_id_and_owner(
        conn: impl PgExecutor<'_>,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM boards WHERE id = $1 AND owner_id = $2",
            BOARD_COLUMNS
        );

        sqlx::query_as::<_, Board>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(conn)
            .await
    }

    /// Same as [`Board::find_by_id_and_owner`] but takes a row lock
    pub async fn lock_by_id_and_owner(
        conn: &mut PgConnection,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM boards WHERE id = $1 AND owner_id = $2 FOR UPDATE",
            BOARD_COLUMNS
        );

        sqlx::query_as::<_, Board>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(conn)
            .await
    }

    /// All boards of an owner, oldest first
    pub async fn list_by_owner(
        conn: impl PgExecutor<'_>,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM boards WHERE owner_id = $1 ORDER BY created_at, id",
            BOARD_COLUMNS
        );

        sqlx::query_as::<_, Board>(&sql)
            .bind(owner_id)
            .fetch_all(conn)
            .await
    }

    /// The owner's active board, if any
    pub async fn find_active(
        conn: impl PgExecutor<'_>,
        owner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM boards WHERE owner_id = $1 AND is_active ORDER BY updated_at DESC LIMIT 1",
            BOARD_COLUMNS
        );

        sqlx::query_as::<_, Board>(&sql)
            .bind(owner_id)
            .fetch_optional(conn)
            .await
    }

    /// The owner's most recently created board
    pub async fn most_recent(
        conn: impl PgExecutor<'_>,
        owner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM boards WHERE owner_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1",
            BOARD_COLUMNS
        );

        sqlx::query_as::<_, Board>(&sql)
            .bind(owner_id)
            .fetch_optional(conn)
            .await
    }

    pub async fn rename(conn: impl PgExecutor<'_>, id: Uuid, name: &str) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "UPDATE boards SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            BOARD_COLUMNS
        );

        sqlx::query_as::<_, Board>(&sql)
            .bind(id)
            .bind(name)
            .fetch_one(conn)
            .await
    }

    pub async fn set_active(
        conn: impl PgExecutor<'_>,
        id: Uuid,
        is_active: bool,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "UPDATE boards SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            BOARD_COLUMNS
        );

        sqlx::query_as::<_, Board>(&sql)
            .bind(id)
            .bind(is_active)
            .fetch_one(conn)
            .await
    }

    /// Marks every other board of the owner inactive
    pub async fn deactivate_others(
        conn: impl PgExecutor<'_>,
        owner_id: Uuid,
        keep_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE boards
            SET is_active = FALSE, updated_at = NOW()
            WHERE owner_id = $1 AND id <> $2 AND is_active
            "#,
        )
        .bind(owner_id)
        .bind(keep_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes a board; columns, tasks and subtasks cascade
    pub async fn delete(conn: impl PgExecutor<'_>, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Loads the requested relations for a list of boards
    ///
    /// Issues one query per relation level rather than one per board.
    pub async fn load_relations(
        pool: &PgPool,
        boards: Vec<Board>,
        relations: BoardRelations,
    ) -> Result<Vec<BoardWithRelations>, sqlx::Error> {
        let board_ids: Vec<Uuid> = boards.iter().map(|b| b.id).collect();

        let mut trees: HashMap<Uuid, Vec<ColumnTree>> = HashMap::new();
        if relations.columns {
            let columns = Column::list_by_boards(pool, &board_ids).await?;
            let column_ids: Vec<Uuid> = columns.iter().map(|c| c.id).collect();
            let tasks = Task::list_by_columns(pool, &column_ids).await?;
            let task_ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
            let subtasks = Subtask::list_by_tasks(pool, &task_ids).await?;

            let mut subtasks_by_task: HashMap<Uuid, Vec<Subtask>> = HashMap::new();
            for subtask in subtasks {
                subtasks_by_task.entry(subtask.task_id).or_default().push(subtask);
            }

            let mut tasks_by_column: HashMap<Uuid, Vec<TaskTree>> = HashMap::new();
            for task in tasks {
                let subtasks = subtasks_by_task.remove(&task.id).unwrap_or_default();
                tasks_by_column
                    .entry(task.column_id)
                    .or_default()
                    .push(TaskTree { task, subtasks });
            }

            for column in columns {
                let tasks = tasks_by_column.remove(&column.id).unwrap_or_default();
                trees
                    .entry(column.board_id)
                    .or_default()
                    .push(ColumnTree { column, tasks });
            }
        }

        let mut owners: HashMap<Uuid, User> = HashMap::new();
        if relations.user {
            for board in &boards {
                if owners.contains_key(&board.owner_id) {
                    continue;
                }
                if let Some(user) = User::find_by_id(pool, board.owner_id).await? {
                    owners.insert(user.id, user);
                }
            }
        }

        Ok(boards
            .into_iter()
            .map(|board| BoardWithRelations {
                columns: relations
                    .columns
                    .then(|| trees.remove(&board.id).unwrap_or_default()),
                user: owners.get(&board.owner_id).cloned(),
                board,
            })
            .collect())
    }
}
