//! Intra-container reorder
//!
//! Repositions one item inside its own sibling set by shifting only the
//! contiguous range between the old and the new position:
//!
//! - moving earlier (`new < current`): `[new, current - 1]` shift down by one
//!   slot (`+1`)
//! - moving later (`new > current`): `[current + 1, new]` shift up (`-1`)
//!
//! Siblings outside that range are never written.
//!
//! Bulk subtask reorder instead plans the final order up front: every entry's
//! subtask is pinned to its requested slot and the remaining subtasks fill the
//! free slots in their current order. Only rows whose position changes are
//! written.

use super::{check_position, OrderedTable, OrderingPolicy, SUBTASKS, TASKS};
use crate::db::transaction::begin;
use crate::error::{CoreError, CoreResult};
use crate::models::subtask::Subtask;
use crate::models::task::Task;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of a single-item reorder
#[derive(Debug, Clone)]
pub enum ReorderOutcome<T> {
    /// Positions were rewritten
    Reordered(T),

    /// The item was already at the requested position; nothing was written
    NoOp(T),
}

impl<T> ReorderOutcome<T> {
    pub fn is_noop(&self) -> bool {
        matches!(self, ReorderOutcome::NoOp(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            ReorderOutcome::Reordered(item) | ReorderOutcome::NoOp(item) => item,
        }
    }
}

/// Siblings in `from..=to` move by `delta`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeShift {
    pub from: i32,
    pub to: i32,
    pub delta: i32,
}

/// The minimal sibling shift for moving an item from `current` to `new`
pub fn range_shift(current: i32, new: i32) -> Option<RangeShift> {
    if new < current {
        Some(RangeShift {
            from: new,
            to: current - 1,
            delta: 1,
        })
    } else if new > current {
        Some(RangeShift {
            from: current + 1,
            to: new,
            delta: -1,
        })
    } else {
        None
    }
}

/// Moves `id` from `current` to `new` inside `parent_id`
pub(crate) async fn shift_into_place(
    conn: &mut PgConnection,
    table: OrderedTable,
    parent_id: Uuid,
    id: Uuid,
    current: i32,
    new: i32,
) -> Result<(), sqlx::Error> {
    if let Some(shift) = range_shift(current, new) {
        table
            .shift(&mut *conn, parent_id, shift.from, Some(shift.to), shift.delta)
            .await?;
        table.set_position(&mut *conn, id, new).await?;
    }
    Ok(())
}

/// Repositions a task inside its column
///
/// `new_position` must lie in `0..count`. A task already at `new_position`
/// yields [`ReorderOutcome::NoOp`] without opening a transaction.
///
/// # Errors
///
/// - `NotFound` if the task does not exist or belongs to another owner
/// - `ValidationFailed` if the position is out of range
/// - `Conflict` if a concurrent writer changed the column
pub async fn reorder_task(
    pool: &PgPool,
    policy: &OrderingPolicy,
    owner_id: Uuid,
    task_id: Uuid,
    new_position: i32,
) -> CoreResult<ReorderOutcome<Task>> {
    let task = Task::find_by_id_and_owner(pool, task_id, owner_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Task"))?;

    let count = TASKS.count(pool, task.column_id).await?;
    check_position(new_position, count)?;

    if task.position == new_position {
        debug!(task_id = %task_id, position = new_position, "Task already in position");
        return Ok(ReorderOutcome::NoOp(task));
    }

    let mut tx = begin(pool, policy.consistency).await?;
    shift_into_place(
        &mut tx,
        TASKS,
        task.column_id,
        task.id,
        task.position,
        new_position,
    )
    .await?;
    let reordered = Task::find_by_id(&mut *tx, task.id).await?;
    tx.commit().await?;

    info!(
        task_id = %task_id,
        column_id = %task.column_id,
        from = task.position,
        to = new_position,
        "Task reordered"
    );

    Ok(ReorderOutcome::Reordered(reordered))
}

/// One entry of a bulk subtask reorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SubtaskPosition {
    #[serde(alias = "id")]
    pub subtask_id: Uuid,

    #[serde(alias = "order")]
    pub new_position: i32,
}

/// Checks a whole batch against the task's current subtasks
///
/// `siblings` are the task's subtask ids in position order.
pub fn validate_batch(siblings: &[Uuid], entries: &[SubtaskPosition]) -> CoreResult<()> {
    if entries.is_empty() {
        return Err(CoreError::invalid("At least one subtask entry is required"));
    }

    let members: HashSet<Uuid> = siblings.iter().copied().collect();
    let len = siblings.len() as i32;
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(entries.len());
    let mut taken: HashSet<i32> = HashSet::with_capacity(entries.len());

    for entry in entries {
        if !members.contains(&entry.subtask_id) {
            return Err(CoreError::not_found("Subtask"));
        }
        if !seen.insert(entry.subtask_id) {
            return Err(CoreError::invalid(format!(
                "Subtask {} appears more than once",
                entry.subtask_id
            )));
        }
        check_position(entry.new_position, len)?;
        if !taken.insert(entry.new_position) {
            return Err(CoreError::invalid(format!(
                "Position {} is requested more than once",
                entry.new_position
            )));
        }
    }

    Ok(())
}

/// Final order for a validated batch
///
/// Pinned subtasks take their requested slots; the rest keep their relative
/// order in the slots left over.
fn plan_batch(siblings: &[Uuid], entries: &[SubtaskPosition]) -> Vec<Uuid> {
    let mut slots: Vec<Option<Uuid>> = vec![None; siblings.len()];
    for entry in entries {
        slots[entry.new_position as usize] = Some(entry.subtask_id);
    }

    let pinned: HashSet<Uuid> = entries.iter().map(|e| e.subtask_id).collect();
    let mut rest = siblings.iter().filter(|id| !pinned.contains(id));

    slots
        .into_iter()
        .filter_map(|slot| slot.or_else(|| rest.next().copied()))
        .collect()
}

/// Reorders several subtasks of one task in a single transaction
///
/// Every entry is validated before the first write: the batch must be
/// non-empty, name each subtask at most once, reference only subtasks of
/// `task_id` and stay inside `0..count` with no slot requested twice. Each
/// listed subtask ends at its requested position regardless of entry order.
///
/// # Errors
///
/// - `NotFound` if the task or any referenced subtask is missing or foreign
/// - `ValidationFailed` for an empty batch, a repeated subtask or position,
///   or a position out of range
pub async fn bulk_reorder_subtasks(
    pool: &PgPool,
    policy: &OrderingPolicy,
    owner_id: Uuid,
    task_id: Uuid,
    entries: &[SubtaskPosition],
) -> CoreResult<Vec<Subtask>> {
    let task = Task::find_by_id_and_owner(pool, task_id, owner_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Task"))?;

    let mut tx = begin(pool, policy.consistency).await?;

    let current: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM subtasks WHERE task_id = $1 ORDER BY position FOR UPDATE")
            .bind(task.id)
            .fetch_all(&mut *tx)
            .await?;

    if let Err(e) = validate_batch(&current, entries) {
        warn!(task_id = %task_id, error = %e, "Bulk subtask reorder rejected");
        return Err(e);
    }

    // Positions are unique only at commit, so rows can be rewritten one by one
    let planned = plan_batch(&current, entries);
    let mut written = 0;
    for (position, (id, before)) in planned.iter().zip(&current).enumerate() {
        if id != before {
            SUBTASKS.set_position(&mut *tx, *id, position as i32).await?;
            written += 1;
        }
    }

    let subtasks = Subtask::list_by_task(&mut *tx, task.id).await?;
    tx.commit().await?;

    info!(
        task_id = %task_id,
        entries = entries.len(),
        written,
        "Subtasks reordered"
    );
    Ok(subtasks)
}
