/// Task lifecycle controller
///
/// Orchestrates task CRUD: authorizes through the policy table, delegates
/// atomic writes to the [`TaskStore`], resolves assignees to user records and
/// queues a notification to the creator when a status change is persisted.

use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use super::error::{ServiceError, ServiceResult};
use crate::auth::policy::{authorize, list_scope, Action, Caller, Resource};
use crate::models::task::{
    normalize_assignees, CreateTask, NewTask, Task, TaskChange, TaskResponse, UpdateTask,
};
use crate::models::user::UserResponse;
use crate::notify::{Notification, NotificationQueue};
use crate::store::{TaskStore, UserStore};

#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    users: Arc<dyn UserStore>,
    notifications: NotificationQueue,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            tasks,
            users,
            notifications,
        }
    }

    /// Creates a task owned by the caller
    ///
    /// # Errors
    ///
    /// `InvalidAssignees` listing every unknown assignee; no task is stored.
    pub async fn create(&self, caller: &Caller, draft: CreateTask) -> ServiceResult<TaskResponse> {
        ServiceError::check(
            authorize(Some(caller), Action::CreateTask, Resource::None),
            "create tasks",
        )?;
        draft.validate()?;

        let task = self
            .tasks
            .insert_task(NewTask {
                name: draft.name,
                description: draft.description,
                status: draft.status.unwrap_or_default(),
                priority: draft.priority.unwrap_or_default(),
                creator_id: caller.id,
                assignee_ids: normalize_assignees(&draft.assignees),
            })
            .await?;

        info!(task_id = task.id, caller = %caller.username, "Task created");
        self.respond(task).await
    }

    pub async fn get(&self, caller: &Caller, id: i64) -> ServiceResult<TaskResponse> {
        let task = self.load(id).await?;
        ServiceError::check(
            authorize(Some(caller), Action::ReadTask, resource_of(&task)),
            "read this task",
        )?;

        self.respond(task).await
    }

    /// Lists the tasks the caller may see
    pub async fn list(&self, caller: &Caller) -> ServiceResult<Vec<TaskResponse>> {
        ServiceError::check(
            authorize(Some(caller), Action::ListTasks, Resource::None),
            "list tasks",
        )?;

        let tasks = self.tasks.list_tasks(list_scope(caller)).await?;

        let mut responses = Vec::with_capacity(tasks.len());
        for task in tasks {
            responses.push(self.respond(task).await?);
        }
        Ok(responses)
    }

    /// Applies a partial update
    ///
    /// Absent fields are left unchanged. A present assignee list replaces the
    /// whole set in the same transaction as the other fields.
    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        mut patch: UpdateTask,
    ) -> ServiceResult<TaskResponse> {
        let task = self.load(id).await?;
        ServiceError::check(
            authorize(Some(caller), Action::UpdateTask, resource_of(&task)),
            "update this task",
        )?;
        patch.validate()?;
        patch.assignees = patch.assignees.map(|ids| normalize_assignees(&ids));

        let change = self
            .tasks
            .update_task(id, &patch)
            .await?
            .ok_or_else(|| ServiceError::not_found("task", id))?;

        info!(task_id = id, caller = %caller.username, "Task updated");
        if change.status_changed() {
            self.notify_status_change(&change).await;
        }

        self.respond(change.task).await
    }

    /// Deletes a task and returns its last state
    pub async fn delete(&self, caller: &Caller, id: i64) -> ServiceResult<TaskResponse> {
        let task = self.load(id).await?;
        ServiceError::check(
            authorize(Some(caller), Action::DeleteTask, resource_of(&task)),
            "delete tasks",
        )?;

        // Resolve assignees first; their links are gone once the row is.
        let assignees = self.assignees_of(&task).await?;
        let removed = self
            .tasks
            .delete_task(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("task", id))?;

        info!(task_id = id, caller = %caller.username, "Task deleted");
        Ok(TaskResponse::new(removed, assignees))
    }

    async fn load(&self, id: i64) -> ServiceResult<Task> {
        self.tasks
            .find_task(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("task", id))
    }

    async fn assignees_of(&self, task: &Task) -> ServiceResult<Vec<UserResponse>> {
        let users = self.users.find_users(&task.assignee_ids).await?;
        Ok(users.iter().map(UserResponse::from).collect())
    }

    async fn respond(&self, task: Task) -> ServiceResult<TaskResponse> {
        let assignees = self.assignees_of(&task).await?;
        Ok(TaskResponse::new(task, assignees))
    }

    /// Queues the status email; never fails the update
    async fn notify_status_change(&self, change: &TaskChange) {
        let task = &change.task;
        info!(
            task_id = task.id,
            status_from = %change.previous_status,
            status_to = %task.status,
            "Task status changed"
        );

        match self.users.find_user(task.creator_id).await {
            Ok(Some(creator)) => self.notifications.enqueue(Notification::status_changed(
                &creator.email,
                task,
                change.previous_status,
                task.status,
            )),
            Ok(None) => warn!(
                task_id = task.id,
                creator_id = task.creator_id,
                "Task creator not found, skipping status notification"
            ),
            Err(e) => warn!(
                task_id = task.id,
                error = %e,
                "Failed to look up task creator, skipping status notification"
            ),
        }
    }
}

fn resource_of(task: &Task) -> Resource {
    Resource::Task {
        creator_id: task.creator_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{TaskPriority, TaskStatus};
    use crate::models::user::{NewUser, Role};
    use crate::notify::{self, Notification};
    use crate::store::memory::InMemoryStore;
    use tokio::sync::mpsc::Receiver;

    struct Fixture {
        tasks: TaskService,
        store: Arc<InMemoryStore>,
        outbox: Receiver<Notification>,
        admin: Caller,
        manager: Caller,
        alice: Caller,
        bob: Caller,
    }

    async fn caller(store: &InMemoryStore, username: &str, role: Role) -> Caller {
        let user = store
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: "$argon2id$unused".to_string(),
                role,
            })
            .await
            .unwrap();
        Caller::from(&user)
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let (queue, outbox) = notify::channel(16);
        let tasks = TaskService::new(store.clone(), store.clone(), queue);

        Fixture {
            admin: caller(&store, "root", Role::Admin).await,
            manager: caller(&store, "boss", Role::Manager).await,
            alice: caller(&store, "alice", Role::User).await,
            bob: caller(&store, "bob", Role::User).await,
            tasks,
            store,
            outbox,
        }
    }

    fn draft(name: &str) -> CreateTask {
        CreateTask {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn drain(outbox: &mut Receiver<Notification>) -> Vec<Notification> {
        let mut seen = Vec::new();
        while let Ok(n) = outbox.try_recv() {
            seen.push(n);
        }
        seen
    }

    #[tokio::test]
    async fn test_create_sets_creator_and_defaults() {
        let f = fixture().await;
        let task = f.tasks.create(&f.alice, draft("Write report")).await.unwrap();

        assert_eq!(task.creator_id, f.alice.id);
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(task.assignees.is_empty());
    }

    #[tokio::test]
    async fn test_create_resolves_assignees_as_a_set() {
        let f = fixture().await;
        let mut input = draft("Pair on bug");
        input.assignees = vec![f.bob.id, f.alice.id, f.bob.id];

        let task = f.tasks.create(&f.alice, input).await.unwrap();
        let names: Vec<&str> = task.assignees.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_create_with_unknown_assignee_stores_nothing() {
        let f = fixture().await;
        let mut input = draft("Ghost work");
        input.assignees = vec![f.bob.id, 404];

        let result = f.tasks.create(&f.alice, input).await;
        assert!(matches!(result, Err(ServiceError::InvalidAssignees(ids)) if ids == vec![404]));
        assert_eq!(f.store.task_count(), 0);
    }

    #[tokio::test]
    async fn test_create_by_deleted_caller_is_unauthenticated() {
        let f = fixture().await;
        f.store.delete_user(f.bob.id).await.unwrap();

        let mut input = draft("Orphan");
        input.assignees = vec![f.alice.id];

        let result = f.tasks.create(&f.bob, input).await;
        assert!(matches!(result, Err(ServiceError::Unauthenticated)));
        assert_eq!(f.store.task_count(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let f = fixture().await;
        let result = f.tasks.create(&f.alice, draft("")).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(f.store.task_count(), 0);
    }

    #[tokio::test]
    async fn test_get_and_update_foreign_task_forbidden_for_user() {
        let f = fixture().await;
        let task = f.tasks.create(&f.alice, draft("Alice only")).await.unwrap();

        assert!(matches!(
            f.tasks.get(&f.bob, task.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        let patch = UpdateTask {
            name: Some("Hijacked".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.tasks.update(&f.bob, task.id, patch.clone()).await,
            Err(ServiceError::Forbidden(_))
        ));

        for privileged in [&f.admin, &f.manager] {
            assert!(f.tasks.get(privileged, task.id).await.is_ok());
            assert!(f.tasks.update(privileged, task.id, patch.clone()).await.is_ok());
        }
        assert!(f.tasks.get(&f.alice, task.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let f = fixture().await;
        assert!(matches!(
            f.tasks.get(&f.admin, 77).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.tasks.update(&f.admin, 77, UpdateTask::default()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.tasks.delete(&f.admin, 77).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_scoped_for_users() {
        let f = fixture().await;
        f.tasks.create(&f.alice, draft("a1")).await.unwrap();
        f.tasks.create(&f.bob, draft("b1")).await.unwrap();
        f.tasks.create(&f.alice, draft("a2")).await.unwrap();
        f.tasks.create(&f.manager, draft("m1")).await.unwrap();

        let own = f.tasks.list(&f.alice).await.unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|t| t.creator_id == f.alice.id));

        assert_eq!(f.tasks.list(&f.admin).await.unwrap().len(), 4);
        assert_eq!(f.tasks.list(&f.manager).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_assigned_but_not_created_is_not_listed() {
        let f = fixture().await;
        let mut input = draft("For bob");
        input.assignees = vec![f.bob.id];
        f.tasks.create(&f.alice, input).await.unwrap();

        assert!(f.tasks.list(&f.bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_with_unknown_assignee_is_atomic() {
        let f = fixture().await;
        let mut input = draft("Keep assignees");
        input.assignees = vec![f.bob.id];
        let task = f.tasks.create(&f.alice, input).await.unwrap();

        let patch = UpdateTask {
            status: Some(TaskStatus::Done),
            assignees: Some(vec![f.alice.id, 999]),
            ..Default::default()
        };
        let result = f.tasks.update(&f.alice, task.id, patch).await;
        assert!(matches!(result, Err(ServiceError::InvalidAssignees(ids)) if ids == vec![999]));

        let stored = f.tasks.get(&f.alice, task.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Todo);
        let ids: Vec<i64> = stored.assignees.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![f.bob.id]);
    }

    #[tokio::test]
    async fn test_update_replaces_assignee_set() {
        let f = fixture().await;
        let mut input = draft("Rotate");
        input.assignees = vec![f.bob.id];
        let task = f.tasks.create(&f.alice, input).await.unwrap();

        let patch = UpdateTask {
            assignees: Some(vec![f.manager.id, f.alice.id]),
            ..Default::default()
        };
        let updated = f.tasks.update(&f.alice, task.id, patch).await.unwrap();
        let ids: Vec<i64> = updated.assignees.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![f.manager.id, f.alice.id]);
    }

    #[tokio::test]
    async fn test_status_change_queues_exactly_one_notification() {
        let mut f = fixture().await;
        let task = f.tasks.create(&f.alice, draft("Ship it")).await.unwrap();

        let patch = UpdateTask {
            status: Some(TaskStatus::Done),
            ..Default::default()
        };
        // A manager moves the task; the creator is the one told.
        f.tasks.update(&f.manager, task.id, patch).await.unwrap();

        let sent = drain(&mut f.outbox);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
        assert_eq!(sent[0].subject, "Task \"Ship it\" status changed");
        assert!(sent[0].body.contains("from <em>todo</em> to <em>done</em>"));
    }

    #[tokio::test]
    async fn test_non_status_update_queues_nothing() {
        let mut f = fixture().await;
        let task = f.tasks.create(&f.alice, draft("Quiet")).await.unwrap();

        let patch = UpdateTask {
            description: Some("more detail".to_string()),
            priority: Some(TaskPriority::High),
            ..Default::default()
        };
        let updated = f.tasks.update(&f.alice, task.id, patch).await.unwrap();

        assert_eq!(updated.description.as_deref(), Some("more detail"));
        assert_eq!(updated.name, "Quiet");
        assert!(drain(&mut f.outbox).is_empty());
    }

    #[tokio::test]
    async fn test_update_with_current_values_is_a_quiet_no_op() {
        let mut f = fixture().await;
        let task = f.tasks.create(&f.alice, draft("Same")).await.unwrap();

        let patch = UpdateTask {
            name: Some("Same".to_string()),
            status: Some(TaskStatus::Todo),
            ..Default::default()
        };
        let updated = f.tasks.update(&f.alice, task.id, patch).await.unwrap();

        assert_eq!(updated.name, "Same");
        assert_eq!(updated.status, TaskStatus::Todo);
        assert!(drain(&mut f.outbox).is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_does_not_fail_update() {
        let store = Arc::new(InMemoryStore::new());
        let (queue, _outbox) = notify::channel(1);
        let tasks = TaskService::new(store.clone(), store.clone(), queue);
        let alice = caller(&store, "alice", Role::User).await;
        let task = tasks.create(&alice, draft("Busy")).await.unwrap();

        for status in [TaskStatus::InProgress, TaskStatus::Done, TaskStatus::Todo] {
            let patch = UpdateTask {
                status: Some(status),
                ..Default::default()
            };
            assert!(tasks.update(&alice, task.id, patch).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_delete_requires_admin_or_manager() {
        let f = fixture().await;
        let task = f.tasks.create(&f.alice, draft("Mine")).await.unwrap();

        assert!(matches!(
            f.tasks.delete(&f.alice, task.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(f.store.find_task(task.id).await.unwrap().is_some());

        let removed = f.tasks.delete(&f.manager, task.id).await.unwrap();
        assert_eq!(removed.id, task.id);
        assert!(f.store.find_task(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_returns_snapshot_with_assignees() {
        let f = fixture().await;
        let mut input = draft("Snapshot");
        input.assignees = vec![f.bob.id];
        let task = f.tasks.create(&f.alice, input).await.unwrap();

        let removed = f.tasks.delete(&f.admin, task.id).await.unwrap();
        assert_eq!(removed.name, "Snapshot");
        assert_eq!(removed.assignees.len(), 1);
        assert_eq!(removed.assignees[0].username, "bob");
    }
}
