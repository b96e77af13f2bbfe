//! Task position mover
//!
//! Moves a task to a position in any column of the same owner. All
//! validation reads happen before the first write; the write itself is three
//! statements in one transaction, in this order:
//!
//! 1. close the gap in the source column (`position > current` decrement)
//! 2. open a slot in the destination (`position >= new` increment)
//! 3. place the task at `(new column, new position)`
//!
//! Same-column moves use the same three statements. The task's own row may
//! be shifted by step 2 but is overwritten by step 3, so the net effect
//! equals the minimal range shift.
//!
//! # Example
//!
//! ```no_run
//! use taskboard_shared::ordering::mover::{move_task, MoveOutcome, MoveTarget};
//! use taskboard_shared::ordering::OrderingPolicy;
//! # async fn example(pool: sqlx::PgPool, owner_id: uuid::Uuid, task_id: uuid::Uuid, done: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//! let target = MoveTarget { column_id: done, position: 0 };
//! match move_task(&pool, &OrderingPolicy::default(), owner_id, task_id, target).await? {
//!     MoveOutcome::Moved(task) => println!("now {}", task.status),
//!     MoveOutcome::NoOp(_) => println!("already there"),
//! }
//! # Ok(())
//! # }
//! ```

use super::{check_position, OrderingPolicy, TASKS};
use crate::db::transaction::begin;
use crate::error::{CoreError, CoreResult};
use crate::models::column::Column;
use crate::models::task::Task;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Destination of a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MoveTarget {
    #[serde(alias = "new_column_id")]
    pub column_id: Uuid,

    /// 0-based position in the destination column
    #[serde(alias = "new_order")]
    pub position: i32,
}

/// Result of a move
#[derive(Debug, Clone)]
pub enum MoveOutcome {
    /// The task was moved; `status` reflects the destination column
    Moved(Task),

    /// The task was already at the target; nothing was written
    NoOp(Task),
}

impl MoveOutcome {
    pub fn task(&self) -> &Task {
        match self {
            MoveOutcome::Moved(task) | MoveOutcome::NoOp(task) => task,
        }
    }

    pub fn into_task(self) -> Task {
        match self {
            MoveOutcome::Moved(task) | MoveOutcome::NoOp(task) => task,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, MoveOutcome::NoOp(_))
    }
}

/// Number of valid target positions in the destination column
///
/// `dest_count` includes the task itself when it already lives there; a
/// cross-column move may also append after the last task.
pub fn target_slots(same_column: bool, dest_count: i32) -> i32 {
    if same_column {
        dest_count
    } else {
        dest_count + 1
    }
}

/// Moves a task to another position, possibly in another column
///
/// # Errors
///
/// - `NotFound` if the task or destination column is missing or foreign
/// - `ValidationFailed` if the position is out of range
/// - `Conflict` if the name policy rejects the move or a concurrent writer
///   changed either column
pub async fn move_task(
    pool: &PgPool,
    policy: &OrderingPolicy,
    owner_id: Uuid,
    task_id: Uuid,
    target: MoveTarget,
) -> CoreResult<MoveOutcome> {
    let task = Task::find_by_id_and_owner(pool, task_id, owner_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Task"))?;

    let destination = Column::find_by_id_and_owner(pool, target.column_id, owner_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Column"))?;

    let same_column = destination.id == task.column_id;
    if same_column && task.position == target.position {
        debug!(task_id = %task_id, "Task already in the requested column and position");
        return Ok(MoveOutcome::NoOp(task));
    }

    let dest_count = TASKS.count(pool, destination.id).await?;
    check_position(target.position, target_slots(same_column, dest_count))?;

    if policy.unique_task_names_per_column
        && !same_column
        && Task::name_taken_in_column(pool, destination.id, &task.name, task.id).await?
    {
        warn!(
            task_id = %task_id,
            column_id = %destination.id,
            "Move rejected: duplicate task name in destination"
        );
        return Err(CoreError::Conflict(format!(
            "A task named '{}' already exists in column '{}'",
            task.name, destination.name
        )));
    }

    let mut tx = begin(pool, policy.consistency).await?;
    apply_move(&mut tx, &task, destination.id, target.position).await?;
    let moved = Task::find_by_id(&mut *tx, task.id).await?;
    tx.commit().await?;

    info!(
        task_id = %task_id,
        from_column = %task.column_id,
        from_position = task.position,
        to_column = %destination.id,
        to_position = target.position,
        "Task moved"
    );

    Ok(MoveOutcome::Moved(moved))
}

/// The three position writes of a move, on the caller's transaction
async fn apply_move(
    conn: &mut PgConnection,
    task: &Task,
    column_id: Uuid,
    position: i32,
) -> Result<(), sqlx::Error> {
    TASKS
        .shift(&mut *conn, task.column_id, task.position + 1, None, -1)
        .await?;
    TASKS.shift(&mut *conn, column_id, position, None, 1).await?;
    Task::place(&mut *conn, task.id, column_id, position).await
}
