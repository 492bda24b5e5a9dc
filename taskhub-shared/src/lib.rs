//! # taskhub Shared Library
//!
//! Domain logic shared by the taskhub API server and the notification worker.
//!
//! ## Module Organization
//!
//! - `models`: users, tasks and their SQL
//! - `auth`: password hashing, bearer tokens, the access-control table
//! - `db`: connection pool and migrations
//! - `store`: persistence ports with Postgres and in-memory adapters
//! - `service`: user and task lifecycle services
//! - `notify`: notification queue, dispatcher and Redis outbox

pub mod auth;
pub mod db;
pub mod models;
pub mod notify;
pub mod service;
pub mod store;

/// Current version of the taskhub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
