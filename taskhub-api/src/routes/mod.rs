/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login (token issuance)
/// - `users`: Registration and user management
/// - `tasks`: Task CRUD

pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;
