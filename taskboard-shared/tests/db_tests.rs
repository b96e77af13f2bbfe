//! Integration tests for the database layer
//!
//! Require a running PostgreSQL database (see `common`).

mod common;

use common::{database_url, new_user, test_pool};
use std::time::Duration;
use taskboard_shared::db::{
    migrations::{applied_migration_count, run_migrations},
    pool::{create_pool, get_pool_stats, health_check, DatabaseConfig},
    transaction::{begin, ConsistencyLevel},
};

#[tokio::test]
async fn test_pool_health_check() {
    let pool = test_pool().await;

    assert!(health_check(&pool).await.is_ok());

    let stats = get_pool_stats(&pool);
    assert!(stats.size <= 5);
    assert!(stats.idle as u32 <= stats.size);
}

#[tokio::test]
async fn test_migrations_are_recorded() {
    let pool = test_pool().await;

    let count = applied_migration_count(&pool).await.unwrap();
    assert!(count >= 1, "expected at least one applied migration, got {}", count);
}

#[tokio::test]
async fn test_rerunning_migrations_is_a_noop() {
    let pool = test_pool().await;

    let before = applied_migration_count(&pool).await.unwrap();
    run_migrations(&pool).await.unwrap();
    assert_eq!(applied_migration_count(&pool).await.unwrap(), before);
}

#[tokio::test]
async fn test_connections_carry_statement_timeout() {
    test_pool().await;

    let pool = create_pool(DatabaseConfig {
        max_connections: 1,
        statement_timeout: Some(Duration::from_millis(250)),
        ..DatabaseConfig::new(database_url())
    })
    .await
    .unwrap();

    let timeout: String = sqlx::query_scalar("SHOW statement_timeout")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(timeout, "250ms");

    let name: String = sqlx::query_scalar("SHOW application_name")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(name, "taskboard");
}

#[tokio::test]
async fn test_begin_applies_isolation_level() {
    let pool = test_pool().await;

    for (level, expected) in [
        (ConsistencyLevel::ReadCommitted, "read committed"),
        (ConsistencyLevel::Serializable, "serializable"),
    ] {
        let mut tx = begin(&pool, level).await.unwrap();
        let isolation: String = sqlx::query_scalar("SHOW transaction_isolation")
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(isolation, expected);
    }
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let pool = test_pool().await;
    let user = new_user(&pool).await;

    let mut tx = begin(&pool, ConsistencyLevel::ReadCommitted).await.unwrap();
    sqlx::query("INSERT INTO boards (owner_id, name) VALUES ($1, 'Never committed')")
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .unwrap();
    drop(tx);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM boards WHERE owner_id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_deferred_position_constraint_fires_at_commit() {
    let pool = test_pool().await;
    let user = new_user(&pool).await;

    let board_id: uuid::Uuid =
        sqlx::query_scalar("INSERT INTO boards (owner_id, name) VALUES ($1, 'Deferred') RETURNING id")
            .bind(user.id)
            .fetch_one(&pool)
            .await
            .unwrap();

    let mut tx = begin(&pool, ConsistencyLevel::ReadCommitted).await.unwrap();
    for name in ["one", "two"] {
        // Both at position 0: accepted until commit
        sqlx::query("INSERT INTO board_columns (board_id, name, position) VALUES ($1, $2, 0)")
            .bind(board_id)
            .bind(name)
            .execute(&mut *tx)
            .await
            .unwrap();
    }
    let err = tx.commit().await.unwrap_err();
    let db_err = err.as_database_error().unwrap();
    assert_eq!(db_err.constraint(), Some("columns_board_position_key"));

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();
}
