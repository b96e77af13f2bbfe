//! Schema migrations
//!
//! The SQL lives in `migrations/` at the workspace root and is embedded into
//! the binary by `sqlx::migrate!`, so a deployed server carries the schema
//! it was built against.

use sqlx::migrate::{MigrateDatabase, MigrateError, Migrator};
use sqlx::{PgPool, Postgres};
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Applies every pending migration
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    let before = applied_migration_count(pool).await.unwrap_or(0);
    MIGRATOR.run(pool).await?;
    let after = applied_migration_count(pool).await?;

    info!(
        applied = after - before,
        total = MIGRATOR.iter().count(),
        "Database schema up to date"
    );
    Ok(())
}

/// Number of successfully applied migrations; 0 before the first run
pub async fn applied_migration_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let tracked: Option<String> =
        sqlx::query_scalar("SELECT to_regclass('public._sqlx_migrations')::TEXT")
            .fetch_one(pool)
            .await?;

    if tracked.is_none() {
        return Ok(0);
    }

    sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
        .fetch_one(pool)
        .await
}

/// Creates the database named in `database_url` if it is missing
///
/// Used by the test fixtures so a fresh PostgreSQL instance works without
/// manual setup.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(database_url).await? {
        info!("Creating missing database");
        Postgres::create_database(database_url).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_embedded() {
        assert!(MIGRATOR.iter().count() >= 1);
        assert!(MIGRATOR
            .iter()
            .any(|m| m.description.contains("initial schema")));
    }
}
