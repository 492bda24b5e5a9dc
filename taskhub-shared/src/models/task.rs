/// Task model and database operations
///
/// A task is owned by its creator and carries a set of assignees. The
/// assignee relationship is a join collection of user IDs owned by the task
/// aggregate; user records are resolved by ID when a response is built.
///
/// # Status
///
/// ```text
/// todo ⇄ in_progress ⇄ done   (and todo ⇄ done)
/// ```
///
/// Every transition is allowed. A persisted change of status notifies the
/// creator.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'done');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
///
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(80) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'todo',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     creator_id BIGINT NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE task_assignees (
///     task_id BIGINT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     PRIMARY KEY (task_id, user_id)
/// );
/// ```
///
/// The query helpers take a `&mut PgConnection` so the store can compose
/// them inside one transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use std::collections::BTreeSet;
use validator::Validate;

use super::user::UserResponse;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started (default)
    Todo,

    /// Being worked on
    InProgress,

    /// Finished
    Done,
}

impl TaskStatus {
    /// Wire/database name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

/// Task aggregate
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub id: i64,

    /// Short name (1-80 characters)
    pub name: String,

    /// Optional free-form description
    pub description: Option<String>,

    /// Current status
    pub status: TaskStatus,

    /// Priority
    pub priority: TaskPriority,

    /// User who created the task; never changes
    pub creator_id: i64,

    /// Assigned user IDs, ascending, no duplicates
    pub assignee_ids: Vec<i64>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
}

/// Which tasks a listing may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    /// Every task
    All,

    /// Only tasks created by this user
    CreatedBy(i64),
}

impl TaskScope {
    /// Whether a task falls inside the scope
    pub fn includes(&self, task: &Task) -> bool {
        match self {
            TaskScope::All => true,
            TaskScope::CreatedBy(user_id) => task.creator_id == *user_id,
        }
    }
}

/// Task creation payload
///
/// The creator is always the caller, so it is not part of the payload.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateTask {
    /// Task name
    #[validate(length(min = 1, max = 80, message = "Name must be 1 to 80 characters"))]
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Status (defaults to todo)
    #[serde(default)]
    pub status: Option<TaskStatus>,

    /// Priority (defaults to medium)
    #[serde(default)]
    pub priority: Option<TaskPriority>,

    /// Assignee user IDs
    #[serde(default)]
    pub assignees: Vec<i64>,
}

/// Partial update
///
/// Absent and `null` fields are both left unchanged; nothing is ever cleared
/// back to a default. A present `assignees` list replaces the whole set.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTask {
    #[validate(length(min = 1, max = 80, message = "Name must be 1 to 80 characters"))]
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub status: Option<TaskStatus>,

    #[serde(default)]
    pub priority: Option<TaskPriority>,

    #[serde(default)]
    pub assignees: Option<Vec<i64>>,
}

/// Row ready for insertion, produced by the lifecycle controller
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub creator_id: i64,
    pub assignee_ids: Vec<i64>,
}

/// Result of a persisted update
#[derive(Debug, Clone)]
pub struct TaskChange {
    /// Status the task had before this update
    pub previous_status: TaskStatus,

    /// Task after the update
    pub task: Task,
}

impl TaskChange {
    /// Whether this update moved the task to a different status
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.task.status
    }
}

/// Public view of a task with resolved assignees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub creator_id: i64,
    pub assignees: Vec<UserResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskResponse {
    /// Builds a response from a task and its resolved assignees
    pub fn new(task: Task, assignees: Vec<UserResponse>) -> Self {
        Self {
            id: task.id,
            name: task.name,
            description: task.description,
            status: task.status,
            priority: task.priority,
            creator_id: task.creator_id,
            assignees,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Collapses an assignee list to a sorted set
pub fn normalize_assignees(ids: &[i64]) -> Vec<i64> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

const TASK_SELECT: &str = r#"
    SELECT t.id, t.name, t.description, t.status, t.priority, t.creator_id,
           t.created_at, t.updated_at,
           COALESCE(
               array_agg(a.user_id ORDER BY a.user_id) FILTER (WHERE a.user_id IS NOT NULL),
               '{}'
           ) AS assignee_ids
    FROM tasks t
    LEFT JOIN task_assignees a ON a.task_id = t.id
"#;

impl Task {
    /// Inserts the task row and returns its ID
    pub async fn insert(conn: &mut PgConnection, data: &NewTask) -> Result<i64, sqlx::Error> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO tasks (name, description, status, priority, creator_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.creator_id)
        .fetch_one(conn)
        .await?;

        Ok(id)
    }

    /// Loads a task with its assignee IDs
    pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("{TASK_SELECT} WHERE t.id = $1 GROUP BY t.id");

        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Lists tasks inside `scope`, ordered by ID
    pub async fn list(conn: &mut PgConnection, scope: TaskScope) -> Result<Vec<Self>, sqlx::Error> {
        match scope {
            TaskScope::All => {
                let query = format!("{TASK_SELECT} GROUP BY t.id ORDER BY t.id");
                sqlx::query_as::<_, Task>(&query).fetch_all(conn).await
            }
            TaskScope::CreatedBy(creator_id) => {
                let query =
                    format!("{TASK_SELECT} WHERE t.creator_id = $1 GROUP BY t.id ORDER BY t.id");
                sqlx::query_as::<_, Task>(&query)
                    .bind(creator_id)
                    .fetch_all(conn)
                    .await
            }
        }
    }

    /// Locks the task row and returns its current status
    ///
    /// Must run inside a transaction.
    pub async fn lock_status(
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<Option<TaskStatus>, sqlx::Error> {
        let row: Option<(TaskStatus,)> =
            sqlx::query_as("SELECT status FROM tasks WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(conn)
                .await?;

        Ok(row.map(|(status,)| status))
    }

    /// Applies the scalar fields of a patch
    ///
    /// `NULL` parameters keep the current column value.
    pub async fn apply_patch(
        conn: &mut PgConnection,
        id: i64,
        patch: &UpdateTask,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                status = COALESCE($4, status),
                priority = COALESCE($5, priority),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(patch.status)
        .bind(patch.priority)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Replaces the full assignee set of a task
    pub async fn replace_assignees(
        conn: &mut PgConnection,
        id: i64,
        user_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM task_assignees WHERE task_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if !user_ids.is_empty() {
            sqlx::query(
                "INSERT INTO task_assignees (task_id, user_id) SELECT $1, UNNEST($2::BIGINT[])",
            )
            .bind(id)
            .bind(user_ids)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Returns the IDs in `user_ids` that don't belong to any user
    pub async fn missing_users(
        conn: &mut PgConnection,
        user_ids: &[i64],
    ) -> Result<Vec<i64>, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ANY($1)")
            .bind(user_ids)
            .fetch_all(conn)
            .await?;
        let found: BTreeSet<i64> = found.into_iter().map(|(id,)| id).collect();

        Ok(user_ids
            .iter()
            .copied()
            .filter(|id| !found.contains(id))
            .collect())
    }

    /// Deletes a task; assignee links cascade
    pub async fn delete(conn: &mut PgConnection, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether the user created any task
    pub async fn exists_for_creator(
        conn: &mut PgConnection,
        creator_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM tasks WHERE creator_id = $1)")
                .bind(creator_id)
                .fetch_one(conn)
                .await?;

        Ok(exists)
    }
}
