//! Core error taxonomy
//!
//! Every ordering, reconciliation and activation operation returns
//! `Result<T, CoreError>`. All of them are all-or-nothing: when an error is
//! returned, the transaction that carried the operation has been rolled back
//! and no position shift is visible to other connections.
//!
//! # Variants
//!
//! - `NotFound`: a referenced board/column/task/subtask/tag does not exist or
//!   belongs to another owner
//! - `Conflict`: the request violates a policy or a uniqueness rule, or the
//!   store aborted the transaction because of a concurrent writer
//! - `ValidationFailed`: malformed input detected before any mutation
//! - `Transaction`: any other store failure
//!
//! # Example
//!
//! ```
//! use taskboard_shared::error::CoreError;
//!
//! let err = CoreError::not_found("Task");
//! assert_eq!(err.to_string(), "Task not found");
//! ```

/// SQLSTATE raised by PostgreSQL when a serializable transaction cannot commit
const SERIALIZATION_FAILURE: &str = "40001";

/// SQLSTATE raised when PostgreSQL breaks a deadlock between writers
const DEADLOCK_DETECTED: &str = "40P01";

/// SQLSTATE for unique violations (including deferred ones raised at commit)
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for exclusion constraint violations
const EXCLUSION_VIOLATION: &str = "23P01";

/// Result alias used throughout the core
pub type CoreResult<T> = Result<T, CoreError>;

/// Error type for the ordering and activation core
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Referenced entity is missing or not owned by the caller
    #[error("{0}")]
    NotFound(String),

    /// Policy or uniqueness violation
    #[error("{0}")]
    Conflict(String),

    /// Input rejected before any mutation
    #[error("{0}")]
    ValidationFailed(String),

    /// Underlying store error; the transaction was rolled back
    #[error("Database error: {0}")]
    Transaction(sqlx::Error),
}

impl CoreError {
    /// Builds a `NotFound` for an entity kind
    pub fn not_found(entity: &str) -> Self {
        CoreError::NotFound(format!("{} not found", entity))
    }

    /// Builds a `ValidationFailed` from any displayable message
    pub fn invalid(message: impl Into<String>) -> Self {
        CoreError::ValidationFailed(message.into())
    }

    /// Whether the caller may retry the whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Conflict(msg) if msg.starts_with("Concurrent"))
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                    return CoreError::Conflict(
                        "Concurrent modification detected, retry the request".to_string(),
                    );
                }
                Some(UNIQUE_VIOLATION) | Some(EXCLUSION_VIOLATION) => {
                    let constraint = db_err.constraint().unwrap_or("unknown");
                    return CoreError::Conflict(conflict_message(constraint));
                }
                _ => {}
            }
        }

        CoreError::Transaction(err)
    }
}

/// Maps a constraint name from the schema to a client-facing message
fn conflict_message(constraint: &str) -> String {
    match constraint {
        "users_email_key" => "Email already registered".to_string(),
        "boards_owner_name_key" => "A board with this name already exists".to_string(),
        "boards_single_active_per_owner" => {
            "Concurrent modification detected: another board became active".to_string()
        }
        "columns_board_name_key" => "A column with this name already exists in this board".to_string(),
        "subtasks_task_name_key" => "A subtask with this name already exists in this task".to_string(),
        "tags_owner_name_key" => "A tag with this name already exists".to_string(),
        "tags_owner_color_key" => "A tag with this color already exists".to_string(),
        "task_tags_pkey" => "Tag is already attached to this task".to_string(),
        c if c.ends_with("_position_key") => {
            "Concurrent modification detected: positions changed, retry the request".to_string()
        }
        other => format!("Constraint violation: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        assert_eq!(CoreError::not_found("Board").to_string(), "Board not found");
    }

    #[test]
    fn test_conflict_messages() {
        assert_eq!(
            conflict_message("task_tags_pkey"),
            "Tag is already attached to this task"
        );
        assert!(conflict_message("tasks_column_position_key").starts_with("Concurrent"));
        assert_eq!(
            conflict_message("something_else"),
            "Constraint violation: something_else"
        );
    }

    #[test]
    fn test_retryable_only_for_concurrency_conflicts() {
        let retry = CoreError::Conflict(conflict_message("subtasks_task_position_key"));
        assert!(retry.is_retryable());

        let policy = CoreError::Conflict("A task with this name already exists".to_string());
        assert!(!policy.is_retryable());

        assert!(!CoreError::invalid("bad").is_retryable());
    }

    #[test]
    fn test_row_not_found_is_transaction_error() {
        let err: CoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, CoreError::Transaction(_)));
    }
}
