/// Database models
///
/// # Models
///
/// - `user`: accounts that own boards and tags
/// - `board`: boards, the active-board flag and eager loading
/// - `column`: ordered columns of a board
/// - `task`: ordered tasks of a column, with derived status
/// - `subtask`: ordered subtasks of a task
/// - `tag`: owner-scoped tags and task associations
///
/// Ownership is always resolved through the board: a column, task or subtask
/// belongs to whoever owns its board. Lookups take the caller's `owner_id`
/// and report foreign rows as missing.

pub mod board;
pub mod column;
pub mod subtask;
pub mod tag;
pub mod task;
pub mod user;
