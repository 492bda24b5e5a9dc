//! # taskhub API Server Library
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and auth middleware
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Request extractors that reject with `ApiError`
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
