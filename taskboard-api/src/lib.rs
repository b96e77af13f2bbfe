//! # Taskboard API Server Library
//!
//! HTTP surface of the taskboard backend. The ordering, reconciliation and
//! activation logic lives in `taskboard-shared`; this crate decodes
//! requests, scopes them to the authenticated owner and maps errors.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: configuration from the environment
//! - `error`: error handling and HTTP response mapping
//! - `middleware`: security headers
//! - `routes`: route handlers, one module per resource

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
