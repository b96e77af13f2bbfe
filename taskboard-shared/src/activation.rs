//! Board activation
//!
//! Each owner has at most one active board. Transitions:
//!
//! - `activate`: the board becomes active and every other board of the owner
//!   becomes inactive, in one transaction
//! - `create_with_activation`: the new board starts inactive unless
//!   [`ActivationPolicy::activate_on_create`] is set
//! - `update_board` with `is_active: Some(true)` activates; `Some(false)`
//!   deactivates, leaving the owner with no active board. Apart from
//!   deleting the active board, this is the only transition to zero active
//!   boards
//! - `delete_board`: what happens to an active board's slot is decided by
//!   [`OnActiveDelete`]
//!
//! The schema backs the invariant with a deferred exclusion constraint, so a
//! racing activation fails at commit instead of leaving two active boards.

use crate::db::transaction::{begin, ConsistencyLevel};
use crate::error::{CoreError, CoreResult};
use crate::models::board::Board;
use crate::models::column::Column;
use crate::ordering::reconcile::{reconcile, BoardColumns, ColumnFields, Submitted};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// What happens when the active board is deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnActiveDelete {
    /// The owner is left without an active board
    #[default]
    LeaveNone,

    /// The most recently created remaining board becomes active
    PromoteMostRecent,
}

impl FromStr for OnActiveDelete {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leave_none" => Ok(OnActiveDelete::LeaveNone),
            "promote_most_recent" => Ok(OnActiveDelete::PromoteMostRecent),
            other => Err(format!("Unknown active-board deletion policy: {}", other)),
        }
    }
}

/// Activation policy, read from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationPolicy {
    pub activate_on_create: bool,
    pub on_active_delete: OnActiveDelete,
    pub consistency: ConsistencyLevel,
}

/// Input for creating a board with its initial columns
#[derive(Debug, Clone, Default)]
pub struct CreateBoard {
    pub name: String,

    /// Column names in display order
    pub columns: Vec<String>,
}

/// Board update; `columns: None` removes every column
#[derive(Debug, Clone, Default)]
pub struct UpdateBoard {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub columns: Option<Vec<Submitted<ColumnFields>>>,
}

/// Result of deleting a board
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub deleted: Board,

    /// Board activated in its place, if the policy promoted one
    pub promoted: Option<Board>,
}

/// Activates `board_id` and deactivates the owner's other boards
///
/// # Errors
///
/// `NotFound` if the board is missing or foreign; `Conflict` if a concurrent
/// activation won the race.
pub async fn activate(
    pool: &PgPool,
    policy: &ActivationPolicy,
    owner_id: Uuid,
    board_id: Uuid,
) -> CoreResult<Board> {
    let mut tx = begin(pool, policy.consistency).await?;

    let board = Board::lock_by_id_and_owner(&mut tx, board_id, owner_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Board"))?;

    let board = activate_in(&mut tx, &board).await?;
    tx.commit().await?;

    Ok(board)
}

/// Activation on the caller's transaction: this board first, then the rest
async fn activate_in(conn: &mut PgConnection, board: &Board) -> Result<Board, sqlx::Error> {
    let activated = Board::set_active(&mut *conn, board.id, true).await?;
    let deactivated = Board::deactivate_others(&mut *conn, board.owner_id, board.id).await?;

    info!(
        board_id = %board.id,
        owner_id = %board.owner_id,
        deactivated,
        "Board activated"
    );
    Ok(activated)
}

/// The owner's active board, if any
pub async fn get_active(pool: &PgPool, owner_id: Uuid) -> CoreResult<Option<Board>> {
    Ok(Board::find_active(pool, owner_id).await?)
}

/// Creates a board and its columns in one transaction
///
/// Columns take their index in `data.columns` as position. The board is
/// active only if the policy says so, in which case the owner's other boards
/// are deactivated in the same transaction.
pub async fn create_with_activation(
    pool: &PgPool,
    policy: &ActivationPolicy,
    owner_id: Uuid,
    data: CreateBoard,
) -> CoreResult<Board> {
    let mut tx = begin(pool, policy.consistency).await?;

    let board = Board::insert(&mut *tx, owner_id, &data.name, false).await?;

    for (position, name) in data.columns.iter().enumerate() {
        Column::insert(&mut *tx, board.id, name, position as i32).await?;
    }

    let board = if policy.activate_on_create {
        activate_in(&mut tx, &board).await?
    } else {
        board
    };

    tx.commit().await?;

    info!(
        board_id = %board.id,
        owner_id = %owner_id,
        columns = data.columns.len(),
        is_active = board.is_active,
        "Board created"
    );
    Ok(board)
}

/// Updates name and activation, and reconciles the board's columns
pub async fn update_board(
    pool: &PgPool,
    policy: &ActivationPolicy,
    owner_id: Uuid,
    board_id: Uuid,
    data: UpdateBoard,
) -> CoreResult<Board> {
    let mut tx = begin(pool, policy.consistency).await?;

    let mut board = Board::lock_by_id_and_owner(&mut tx, board_id, owner_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Board"))?;

    if let Some(name) = data.name.as_deref() {
        board = Board::rename(&mut *tx, board.id, name).await?;
    }

    match data.is_active {
        Some(true) => board = activate_in(&mut tx, &board).await?,
        Some(false) if board.is_active => {
            board = Board::set_active(&mut *tx, board.id, false).await?;
            info!(board_id = %board.id, "Board deactivated");
        }
        _ => {}
    }

    reconcile(&mut tx, &BoardColumns { board_id: board.id }, data.columns).await?;

    tx.commit().await?;

    info!(board_id = %board.id, owner_id = %owner_id, "Board updated");
    Ok(board)
}

/// Deletes a board, applying the active-board deletion policy
pub async fn delete_board(
    pool: &PgPool,
    policy: &ActivationPolicy,
    owner_id: Uuid,
    board_id: Uuid,
) -> CoreResult<DeleteOutcome> {
    let mut tx = begin(pool, policy.consistency).await?;

    let board = Board::lock_by_id_and_owner(&mut tx, board_id, owner_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Board"))?;

    Board::delete(&mut *tx, board.id).await?;

    let promoted = match (board.is_active, policy.on_active_delete) {
        (true, OnActiveDelete::PromoteMostRecent) => {
            match Board::most_recent(&mut *tx, owner_id).await? {
                Some(next) => Some(activate_in(&mut tx, &next).await?),
                None => None,
            }
        }
        _ => None,
    };

    tx.commit().await?;

    if promoted.is_none() && board.is_active {
        debug!(owner_id = %owner_id, "Active board deleted, owner has no active board");
    }
    info!(
        board_id = %board.id,
        owner_id = %owner_id,
        promoted = ?promoted.as_ref().map(|b| b.id),
        "Board deleted"
    );

    Ok(DeleteOutcome {
        deleted: board,
        promoted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_on_active_delete() {
        assert_eq!(
            "leave_none".parse::<OnActiveDelete>().unwrap(),
            OnActiveDelete::LeaveNone
        );
        assert_eq!(
            "PROMOTE_MOST_RECENT".parse::<OnActiveDelete>().unwrap(),
            OnActiveDelete::PromoteMostRecent
        );
        assert!("promote_oldest".parse::<OnActiveDelete>().is_err());
    }

    #[test]
    fn test_default_policy_creates_inactive_and_leaves_none() {
        let policy = ActivationPolicy::default();
        assert!(!policy.activate_on_create);
        assert_eq!(policy.on_active_delete, OnActiveDelete::LeaveNone);
        assert_eq!(policy.consistency, ConsistencyLevel::ReadCommitted);
    }
}
