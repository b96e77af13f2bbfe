//! Ordering core
//!
//! Columns within a board, tasks within a column and subtasks within a task
//! are sibling sets ordered by a 0-based dense `position`. Positions are only
//! written here and by initial creation, which appends at
//! `max(position) + 1`.
//!
//! - `reconcile`: sync a submitted list against a persisted sibling set
//! - `mover`: move a task across columns
//! - `reorder`: reposition inside one container, plus bulk subtask reorder
//!
//! Every operation runs in a single transaction; intermediate states may hold
//! duplicate positions because the `(parent, position)` constraints are
//! deferred to commit.

pub mod mover;
pub mod reconcile;
pub mod reorder;

use crate::db::transaction::ConsistencyLevel;
use crate::error::{CoreError, CoreResult};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Policy knobs for ordering operations, read from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderingPolicy {
    /// Reject a move when the destination column already holds a task with
    /// the same name
    pub unique_task_names_per_column: bool,

    /// Isolation level for ordering transactions
    pub consistency: ConsistencyLevel,
}

/// A table holding one kind of sibling set
///
/// Table and column names are compile-time constants, never user input, so
/// they are interpolated into SQL directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderedTable {
    pub table: &'static str,
    pub parent_column: &'static str,
    /// Entity name used in error messages
    pub entity: &'static str,
}

pub const COLUMNS: OrderedTable = OrderedTable {
    table: "board_columns",
    parent_column: "board_id",
    entity: "Column",
};

pub const TASKS: OrderedTable = OrderedTable {
    table: "tasks",
    parent_column: "column_id",
    entity: "Task",
};

pub const SUBTASKS: OrderedTable = OrderedTable {
    table: "subtasks",
    parent_column: "task_id",
    entity: "Subtask",
};

impl OrderedTable {
    /// Number of siblings under `parent_id`
    pub async fn count(&self, conn: impl PgExecutor<'_>, parent_id: Uuid) -> Result<i32, sqlx::Error> {
        let sql = format!(
            "SELECT COUNT(*)::INT4 FROM {} WHERE {} = $1",
            self.table, self.parent_column
        );

        sqlx::query_scalar(&sql).bind(parent_id).fetch_one(conn).await
    }

    /// Position for a newly appended sibling
    pub async fn next_position(
        &self,
        conn: impl PgExecutor<'_>,
        parent_id: Uuid,
    ) -> Result<i32, sqlx::Error> {
        let sql = format!(
            "SELECT COALESCE(MAX(position) + 1, 0)::INT4 FROM {} WHERE {} = $1",
            self.table, self.parent_column
        );

        sqlx::query_scalar(&sql).bind(parent_id).fetch_one(conn).await
    }

    /// Adds `delta` to every sibling whose position lies in `from..=to`
    /// (`to = None` means unbounded)
    pub async fn shift(
        &self,
        conn: impl PgExecutor<'_>,
        parent_id: Uuid,
        from: i32,
        to: Option<i32>,
        delta: i32,
    ) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET position = position + $2 \
             WHERE {} = $1 AND position >= $3 AND ($4::INT4 IS NULL OR position <= $4)",
            self.table, self.parent_column
        );

        let result = sqlx::query(&sql)
            .bind(parent_id)
            .bind(delta)
            .bind(from)
            .bind(to)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Writes one sibling's position
    pub async fn set_position(
        &self,
        conn: impl PgExecutor<'_>,
        id: Uuid,
        position: i32,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET position = $2, updated_at = NOW() WHERE id = $1",
            self.table
        );

        sqlx::query(&sql).bind(id).bind(position).execute(conn).await?;
        Ok(())
    }

    /// Closes the hole left by a removed sibling
    pub async fn close_gap(
        &self,
        conn: impl PgExecutor<'_>,
        parent_id: Uuid,
        removed_position: i32,
    ) -> Result<u64, sqlx::Error> {
        self.shift(conn, parent_id, removed_position + 1, None, -1).await
    }

    /// Sibling ids in position order
    pub async fn ordered_ids(
        &self,
        conn: impl PgExecutor<'_>,
        parent_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let sql = format!(
            "SELECT id FROM {} WHERE {} = $1 ORDER BY position",
            self.table, self.parent_column
        );

        sqlx::query_scalar(&sql).bind(parent_id).fetch_all(conn).await
    }
}

/// Rejects a position outside `0..len`
pub(crate) fn check_position(position: i32, len: i32) -> CoreResult<()> {
    if position < 0 || position >= len.max(1) {
        return Err(CoreError::invalid(format!(
            "Position {} is out of range (0..{})",
            position,
            len.max(1)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_position_bounds() {
        assert!(check_position(0, 3).is_ok());
        assert!(check_position(2, 3).is_ok());
        assert!(check_position(3, 3).is_err());
        assert!(check_position(-1, 3).is_err());
    }

    #[test]
    fn test_check_position_empty_set_accepts_zero() {
        assert!(check_position(0, 0).is_ok());
        assert!(check_position(1, 0).is_err());
    }
}
