/// PostgreSQL store
///
/// Composes the query helpers on [`User`] and [`Task`] into single-operation
/// transactions. Task updates lock the row with `SELECT ... FOR UPDATE` so
/// concurrent edits serialize and the reported previous status is the one
/// actually replaced.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::{is_creator_violation, StoreError, StoreResult, TaskStore, UserStore};
use crate::db::pool::health_check;
use crate::models::task::{NewTask, Task, TaskChange, TaskScope, UpdateTask};
use crate::models::user::{NewUser, Role, User};

/// Store backed by a Postgres connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, user).await?)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_username(&self.pool, username).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn find_users(&self, ids: &[i64]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(User::find_many(&self.pool, ids).await?)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(User::list(&self.pool).await?)
    }

    async fn set_role(&self, id: i64, role: Role) -> StoreResult<Option<User>> {
        Ok(User::set_role(&self.pool, id, role).await?)
    }

    async fn delete_user(&self, id: i64) -> StoreResult<Option<User>> {
        let mut tx = self.pool.begin().await?;

        if Task::exists_for_creator(&mut tx, id).await? {
            return Err(StoreError::UserHasTasks);
        }

        // A task created after the check above still trips the foreign key.
        let removed = User::delete(&mut tx, id).await.map_err(|e| {
            if is_creator_violation(&e) {
                StoreError::UserHasTasks
            } else {
                StoreError::from(e)
            }
        })?;

        tx.commit().await?;
        Ok(removed)
    }

    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, task: NewTask) -> StoreResult<Task> {
        let mut tx = self.pool.begin().await?;

        if !Task::missing_users(&mut tx, &[task.creator_id]).await?.is_empty() {
            return Err(StoreError::CreatorMissing(task.creator_id));
        }

        let missing = Task::missing_users(&mut tx, &task.assignee_ids).await?;
        if !missing.is_empty() {
            return Err(StoreError::MissingUsers(missing));
        }

        let id = Task::insert(&mut tx, &task).await.map_err(|e| {
            if is_creator_violation(&e) {
                StoreError::CreatorMissing(task.creator_id)
            } else {
                StoreError::from(e)
            }
        })?;
        Task::replace_assignees(&mut tx, id, &task.assignee_ids).await?;

        let created = Task::find_by_id(&mut tx, id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;

        tx.commit().await?;
        debug!(task_id = id, "Task inserted");
        Ok(created)
    }

    async fn find_task(&self, id: i64) -> StoreResult<Option<Task>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Task::find_by_id(&mut conn, id).await?)
    }

    async fn list_tasks(&self, scope: TaskScope) -> StoreResult<Vec<Task>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Task::list(&mut conn, scope).await?)
    }

    async fn update_task(&self, id: i64, patch: &UpdateTask) -> StoreResult<Option<TaskChange>> {
        let mut tx = self.pool.begin().await?;

        let Some(previous_status) = Task::lock_status(&mut tx, id).await? else {
            return Ok(None);
        };

        if let Some(assignees) = &patch.assignees {
            let missing = Task::missing_users(&mut tx, assignees).await?;
            if !missing.is_empty() {
                return Err(StoreError::MissingUsers(missing));
            }
        }

        Task::apply_patch(&mut tx, id, patch).await?;
        if let Some(assignees) = &patch.assignees {
            Task::replace_assignees(&mut tx, id, assignees).await?;
        }

        let task = Task::find_by_id(&mut tx, id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;

        tx.commit().await?;
        Ok(Some(TaskChange {
            previous_status,
            task,
        }))
    }

    async fn delete_task(&self, id: i64) -> StoreResult<Option<Task>> {
        let mut tx = self.pool.begin().await?;

        let Some(task) = Task::find_by_id(&mut tx, id).await? else {
            return Ok(None);
        };
        Task::delete(&mut tx, id).await?;

        tx.commit().await?;
        Ok(Some(task))
    }
}
