/// Application services
///
/// - [`users::UserService`]: registration, authentication, user management
/// - [`tasks::TaskService`]: the task lifecycle controller
///
/// Services take an already-resolved [`crate::auth::policy::Caller`] and
/// return [`error::ServiceError`]; they know nothing about HTTP.

pub mod error;
pub mod tasks;
pub mod users;

pub use error::{FieldError, ServiceError, ServiceResult};
pub use tasks::TaskService;
pub use users::{AdminSeed, UserService};
