/// Database layer
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded schema migrations
/// - `transaction`: transactions opened with the configured isolation level
///
/// Models live in the `models` module at crate root level.

pub mod migrations;
pub mod pool;
pub mod transaction;
