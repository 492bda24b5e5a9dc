/// Persistence ports
///
/// The lifecycle services talk to storage only through [`UserStore`] and
/// [`TaskStore`]. Two adapters implement both traits:
///
/// - [`postgres::PgStore`]: production store; every mutating call is one
///   transaction
/// - [`memory::InMemoryStore`]: a single-lock store used by tests
///
/// Both adapters enforce the same invariants: unique username and email,
/// assignees must reference existing users (checked before any write), and a
/// user who created tasks cannot be deleted.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::task::{NewTask, Task, TaskChange, TaskScope, UpdateTask};
use crate::models::user::{NewUser, Role, User};

pub mod memory;
pub mod postgres;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced user IDs do not exist
    #[error("unknown user ids: {0:?}")]
    MissingUsers(Vec<i64>),

    /// Email address is already registered
    #[error("email already registered")]
    DuplicateEmail,

    /// Username is already taken
    #[error("username already taken")]
    DuplicateUsername,

    /// User is still the creator of at least one task
    #[error("user is the creator of existing tasks")]
    UserHasTasks,

    /// The creating user no longer exists
    #[error("creator {0} does not exist")]
    CreatorMissing(i64),

    /// Database failure
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Store could not be used (poisoned lock, unreachable backend)
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.constraint() {
                Some("users_email_key") => return StoreError::DuplicateEmail,
                Some("users_username_key") => return StoreError::DuplicateUsername,
                _ => {}
            }
        }

        StoreError::Database(err)
    }
}

/// Whether `err` is a violation of the task creator foreign key
///
/// The same constraint fires when a task is inserted for a deleted user and
/// when a creator is deleted, so callers decide what it means.
pub(crate) fn is_creator_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.constraint() == Some("tasks_creator_id_fkey")
    )
}

/// Credential store
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateEmail`] or
    /// [`StoreError::DuplicateUsername`] when a uniqueness invariant would be
    /// violated, including when a concurrent insert wins the race.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Loads the users with the given IDs, ordered by ID
    ///
    /// Unknown IDs are skipped.
    async fn find_users(&self, ids: &[i64]) -> StoreResult<Vec<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Changes a user's role; `None` if the user doesn't exist
    async fn set_role(&self, id: i64, role: Role) -> StoreResult<Option<User>>;

    /// Deletes a user and returns the removed record
    ///
    /// Assignee links to the user are removed with it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UserHasTasks`] while the user is the creator of
    /// any task.
    async fn delete_user(&self, id: i64) -> StoreResult<Option<User>>;

    /// Checks that the backend is reachable
    async fn ping(&self) -> StoreResult<()>;
}

/// Task store
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts a task with its assignees
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CreatorMissing`] if the creator doesn't exist and
    /// [`StoreError::MissingUsers`] listing every unresolved assignee;
    /// nothing is written in either case.
    async fn insert_task(&self, task: NewTask) -> StoreResult<Task>;

    async fn find_task(&self, id: i64) -> StoreResult<Option<Task>>;

    /// Lists tasks inside `scope`, ordered by ID
    async fn list_tasks(&self, scope: TaskScope) -> StoreResult<Vec<Task>>;

    /// Applies a partial update atomically
    ///
    /// Returns `None` if the task doesn't exist. The returned change carries
    /// the status the task had immediately before this update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingUsers`] if `patch.assignees` names an
    /// unknown user; the task is left untouched.
    async fn update_task(&self, id: i64, patch: &UpdateTask) -> StoreResult<Option<TaskChange>>;

    /// Deletes a task and returns its final snapshot
    async fn delete_task(&self, id: i64) -> StoreResult<Option<Task>>;
}
