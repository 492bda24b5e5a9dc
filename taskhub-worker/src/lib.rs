//! # taskhub Worker Library
//!
//! Delivers the notifications the API leaves in the Redis outbox.
//!
//! ## Modules
//!
//! - `config`: Worker and SMTP configuration
//! - `consumer`: Outbox polling loop
//! - `mailer`: SMTP delivery

pub mod config;
pub mod consumer;
pub mod mailer;
