/// Domain models and their SQL
///
/// - `user`: accounts and roles
/// - `task`: tasks, status/priority, and the assignee join collection

pub mod task;
pub mod user;
