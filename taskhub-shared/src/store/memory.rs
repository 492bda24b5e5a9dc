/// In-memory store
///
/// One `RwLock` guards all state, so every operation is atomic the same way a
/// single Postgres transaction is. Used by the unit and router tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{StoreError, StoreResult, TaskStore, UserStore};
use crate::models::task::{NewTask, Task, TaskChange, TaskScope, UpdateTask};
use crate::models::user::{NewUser, Role, User};

/// Thread-safe in-memory user and task store
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<i64, User>,
    tasks: BTreeMap<i64, Task>,
    last_user_id: i64,
    last_task_id: i64,
}

impl State {
    fn missing_users(&self, ids: &[i64]) -> Vec<i64> {
        ids.iter()
            .copied()
            .filter(|id| !self.users.contains_key(id))
            .collect()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks
    pub fn task_count(&self) -> usize {
        self.read().map(|state| state.tasks.len()).unwrap_or_default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.write()?;

        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::DuplicateUsername);
        }

        state.last_user_id += 1;
        let stored = User {
            id: state.last_user_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_users(&self, ids: &[i64]) -> StoreResult<Vec<User>> {
        let state = self.read()?;
        let mut users: Vec<User> = ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect();
        users.sort_by_key(|u| u.id);
        users.dedup_by_key(|u| u.id);
        Ok(users)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    async fn set_role(&self, id: i64, role: Role) -> StoreResult<Option<User>> {
        let mut state = self.write()?;
        Ok(state.users.get_mut(&id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<Option<User>> {
        let mut state = self.write()?;

        if !state.users.contains_key(&id) {
            return Ok(None);
        }
        if state.tasks.values().any(|t| t.creator_id == id) {
            return Err(StoreError::UserHasTasks);
        }

        for task in state.tasks.values_mut() {
            task.assignee_ids.retain(|assignee| *assignee != id);
        }
        Ok(state.users.remove(&id))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn insert_task(&self, task: NewTask) -> StoreResult<Task> {
        let mut state = self.write()?;

        if !state.users.contains_key(&task.creator_id) {
            return Err(StoreError::CreatorMissing(task.creator_id));
        }
        let missing = state.missing_users(&task.assignee_ids);
        if !missing.is_empty() {
            return Err(StoreError::MissingUsers(missing));
        }

        state.last_task_id += 1;
        let now = Utc::now();
        let stored = Task {
            id: state.last_task_id,
            name: task.name,
            description: task.description,
            status: task.status,
            priority: task.priority,
            creator_id: task.creator_id,
            assignee_ids: task.assignee_ids,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_task(&self, id: i64) -> StoreResult<Option<Task>> {
        Ok(self.read()?.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, scope: TaskScope) -> StoreResult<Vec<Task>> {
        Ok(self
            .read()?
            .tasks
            .values()
            .filter(|task| scope.includes(task))
            .cloned()
            .collect())
    }

    async fn update_task(&self, id: i64, patch: &UpdateTask) -> StoreResult<Option<TaskChange>> {
        let mut state = self.write()?;

        if !state.tasks.contains_key(&id) {
            return Ok(None);
        }
        if let Some(assignees) = &patch.assignees {
            let missing = state.missing_users(assignees);
            if !missing.is_empty() {
                return Err(StoreError::MissingUsers(missing));
            }
        }

        let Some(task) = state.tasks.get_mut(&id) else {
            return Ok(None);
        };
        let previous_status = task.status;

        if let Some(name) = &patch.name {
            task.name = name.clone();
        }
        if let Some(description) = &patch.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(assignees) = &patch.assignees {
            task.assignee_ids = assignees.clone();
        }
        task.updated_at = Utc::now();

        Ok(Some(TaskChange {
            previous_status,
            task: task.clone(),
        }))
    }

    async fn delete_task(&self, id: i64) -> StoreResult<Option<Task>> {
        Ok(self.write()?.tasks.remove(&id))
    }
}
