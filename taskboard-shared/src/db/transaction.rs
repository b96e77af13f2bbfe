/// Transaction helpers
///
/// Every ordering and activation operation opens its transaction through
/// [`begin`] so the configured isolation level applies uniformly. Position
/// shifts rely on the deferred `(parent, position)` unique constraints, which
/// are checked when the transaction commits.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::db::transaction::{begin, ConsistencyLevel};
/// # async fn example(pool: sqlx::PgPool) -> Result<(), sqlx::Error> {
/// let mut tx = begin(&pool, ConsistencyLevel::Serializable).await?;
/// sqlx::query("UPDATE tasks SET position = position + 1 WHERE column_id = $1")
///     .bind(uuid::Uuid::new_v4())
///     .execute(&mut *tx)
///     .await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Isolation level applied to ordering and activation transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    /// PostgreSQL default; concurrent writers on the same sibling set surface
    /// as deferred unique violations at commit
    #[default]
    ReadCommitted,

    /// Concurrent writers surface as serialization failures (SQLSTATE 40001)
    Serializable,
}

impl ConsistencyLevel {
    fn as_sql(self) -> &'static str {
        match self {
            ConsistencyLevel::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            ConsistencyLevel::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyLevel::ReadCommitted => write!(f, "read_committed"),
            ConsistencyLevel::Serializable => write!(f, "serializable"),
        }
    }
}

impl FromStr for ConsistencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read_committed" => Ok(ConsistencyLevel::ReadCommitted),
            "serializable" => Ok(ConsistencyLevel::Serializable),
            other => Err(format!("Unknown consistency level: {}", other)),
        }
    }
}

/// Opens a transaction and applies the isolation level
///
/// `SET TRANSACTION` must be the first statement of the transaction, so it is
/// issued immediately after `BEGIN`.
pub async fn begin(
    pool: &PgPool,
    level: ConsistencyLevel,
) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(level.as_sql()).execute(&mut *tx).await?;
    debug!(isolation = %level, "Transaction started");

    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_consistency_level() {
        assert_eq!(
            "read_committed".parse::<ConsistencyLevel>().unwrap(),
            ConsistencyLevel::ReadCommitted
        );
        assert_eq!(
            " Serializable ".parse::<ConsistencyLevel>().unwrap(),
            ConsistencyLevel::Serializable
        );
        assert!("repeatable_read".parse::<ConsistencyLevel>().is_err());
    }

    #[test]
    fn test_default_is_read_committed() {
        assert_eq!(ConsistencyLevel::default(), ConsistencyLevel::ReadCommitted);
        assert_eq!(ConsistencyLevel::default().to_string(), "read_committed");
    }
}
