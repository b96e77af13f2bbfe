//! # Taskboard Shared Library
//!
//! Data layer and ordering core of the taskboard backend.
//!
//! ## Module Organization
//!
//! - `db`: connection pool, migrations and transactions
//! - `models`: users, boards, columns, tasks, subtasks and tags
//! - `ordering`: reconciliation, cross-column moves and in-place reorders
//! - `activation`: the single-active-board state machine
//! - `auth`: password hashing, JWTs and the bearer-token middleware
//! - `error`: the core error taxonomy

pub mod activation;
pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod ordering;

/// Current version of the taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
