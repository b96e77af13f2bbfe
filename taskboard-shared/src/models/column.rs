/// Board column model
///
/// Columns form a dense 0-based ordered set within their board. A column's
/// name doubles as the derived `status` of every task inside it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE board_columns (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     board_id UUID NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
///     name VARCHAR(50) NOT NULL,
///     position INTEGER NOT NULL CHECK (position >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use crate::error::{CoreError, CoreResult};
use crate::ordering::COLUMNS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use tracing::info;
use uuid::Uuid;

const COLUMN_FIELDS: &str = "c.id, c.board_id, c.name, c.position, c.created_at, c.updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Column {
    pub id: Uuid,
    pub board_id: Uuid,
    pub name: String,

    /// 0-based position within the board
    pub position: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Column {
    /// Inserts a column at an explicit position
    pub async fn insert(
        conn: impl PgExecutor<'_>,
        board_id: Uuid,
        name: &str,
        position: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Column>(
            r#"
            INSERT INTO board_columns (board_id, name, position)
            VALUES ($1, $2, $3)
            RETURNING id, board_id, name, position, created_at, updated_at
            "#,
        )
        .bind(board_id)
        .bind(name)
        .bind(position)
        .fetch_one(conn)
        .await
    }

    /// Appends a column at the end of its board
    pub async fn append(conn: &mut PgConnection, board_id: Uuid, name: &str) -> Result<Self, sqlx::Error> {
        let position = COLUMNS.next_position(&mut *conn, board_id).await?;
        Self::insert(&mut *conn, board_id, name, position).await
    }

    /// Updates name and position in place; identity is preserved
    ///
    /// An unchanged row is returned as stored, without a write.
    pub async fn update(
        conn: impl PgExecutor<'_>,
        id: Uuid,
        name: &str,
        position: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Column>(
            r#"
            WITH changed AS (
                UPDATE board_columns
                SET name = $2, position = $3, updated_at = NOW()
                WHERE id = $1 AND (name, position) IS DISTINCT FROM ($2::TEXT, $3::INT4)
                RETURNING id, board_id, name, position, created_at, updated_at
            )
            SELECT id, board_id, name, position, created_at, updated_at FROM changed
            UNION ALL
            SELECT id, board_id, name, position, created_at, updated_at
            FROM board_columns
            WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM changed)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(position)
        .fetch_one(conn)
        .await
    }

    pub async fn rename(conn: impl PgExecutor<'_>, id: Uuid, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Column>(
            r#"
            UPDATE board_columns
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, board_id, name, position, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_one(conn)
        .await
    }

    /// Finds a column whose board belongs to `owner_id`
    pub async fn find_by_id_and_owner(
        conn: impl PgExecutor<'_>,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM board_columns c JOIN boards b ON b.id = c.board_id \
             WHERE c.id = $1 AND b.owner_id = $2",
            COLUMN_FIELDS
        );

        sqlx::query_as::<_, Column>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(conn)
            .await
    }

    /// Columns of one board in position order
    pub async fn list_by_board(conn: impl PgExecutor<'_>, board_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM board_columns c WHERE c.board_id = $1 ORDER BY c.position",
            COLUMN_FIELDS
        );

        sqlx::query_as::<_, Column>(&sql)
            .bind(board_id)
            .fetch_all(conn)
            .await
    }

    /// Columns of several boards, grouped by board then position
    pub async fn list_by_boards(
        conn: impl PgExecutor<'_>,
        board_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM board_columns c WHERE c.board_id = ANY($1) ORDER BY c.board_id, c.position",
            COLUMN_FIELDS
        );

        sqlx::query_as::<_, Column>(&sql)
            .bind(board_ids)
            .fetch_all(conn)
            .await
    }

    /// Every column visible to an owner
    pub async fn list_by_owner(conn: impl PgExecutor<'_>, owner_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM board_columns c JOIN boards b ON b.id = c.board_id \
             WHERE b.owner_id = $1 ORDER BY b.created_at, c.position",
            COLUMN_FIELDS
        );

        sqlx::query_as::<_, Column>(&sql)
            .bind(owner_id)
            .fetch_all(conn)
            .await
    }

    /// Deletes a column and closes the gap it leaves
    ///
    /// Runs on the caller's transaction; tasks in the column cascade.
    pub async fn delete(conn: &mut PgConnection, owner_id: Uuid, id: Uuid) -> CoreResult<Column> {
        let column = Self::find_by_id_and_owner(&mut *conn, id, owner_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Column"))?;

        sqlx::query("DELETE FROM board_columns WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        let shifted = COLUMNS
            .close_gap(&mut *conn, column.board_id, column.position)
            .await?;

        info!(column_id = %id, board_id = %column.board_id, shifted, "Column deleted");
        Ok(column)
    }
}
