/// Role-based access control
///
/// Every permission decision in taskhub goes through [`authorize`], a pure
/// function of the caller, the action and the resource. Rights come from the
/// caller's role alone; there is no per-resource ACL.
///
/// # Grant table
///
/// | Action       | admin  | manager | user       |
/// |--------------|--------|---------|------------|
/// | ListTasks    | always | always  | own only   |
/// | CreateTask   | always | always  | always     |
/// | ReadTask     | always | always  | own only   |
/// | UpdateTask   | always | always  | own only   |
/// | DeleteTask   | always | always  | never      |
/// | ListUsers    | always | always  | never      |
/// | ReadUser     | always | always  | never      |
/// | DeleteUser   | always | never   | never      |
/// | ChangeRole   | always | never   | never      |
///
/// "Own only" means the caller created the task. A request without a caller
/// is rejected as unauthenticated before the table is consulted.
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::policy::{authorize, Action, Caller, Decision, Resource};
/// use taskhub_shared::models::user::Role;
///
/// let caller = Caller::new(2, "jdoe", Role::User);
///
/// let own = Resource::Task { creator_id: 2 };
/// assert_eq!(authorize(Some(&caller), Action::UpdateTask, own), Decision::Allow);
///
/// let other = Resource::Task { creator_id: 3 };
/// assert!(authorize(Some(&caller), Action::UpdateTask, other).is_denied());
/// ```

use serde::{Deserialize, Serialize};

use crate::models::task::TaskScope;
use crate::models::user::{Role, User};

/// Authenticated identity making a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl Caller {
    pub fn new(id: i64, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            role,
        }
    }
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.username.clone(), user.role)
    }
}

/// Operation being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ListTasks,
    CreateTask,
    ReadTask,
    UpdateTask,
    DeleteTask,
    ListUsers,
    ReadUser,
    DeleteUser,
    ChangeRole,
}

/// Resource the action targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Collection-level actions (list, create)
    None,

    /// A specific task, identified by what ownership checks need
    Task { creator_id: i64 },

    /// A specific user record
    User { id: i64 },
}

/// How much of an action a role is granted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Always,
    OwnerOnly,
    Never,
}

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No authenticated caller
    Unauthenticated,

    /// Caller is known but lacks the right
    Forbidden,
}

/// Outcome of [`authorize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }
}

/// Looks up the grant a role has for an action
pub fn grant(role: Role, action: Action) -> Grant {
    use Action::*;

    match (role, action) {
        (Role::Admin, _) => Grant::Always,

        (Role::Manager, DeleteUser | ChangeRole) => Grant::Never,
        (Role::Manager, _) => Grant::Always,

        (Role::User, CreateTask) => Grant::Always,
        (Role::User, ListTasks | ReadTask | UpdateTask) => Grant::OwnerOnly,
        (Role::User, DeleteTask | ListUsers | ReadUser | DeleteUser | ChangeRole) => Grant::Never,
    }
}

/// Decides whether `caller` may perform `action` on `resource`
pub fn authorize(caller: Option<&Caller>, action: Action, resource: Resource) -> Decision {
    let Some(caller) = caller else {
        return Decision::Deny(DenyReason::Unauthenticated);
    };

    match grant(caller.role, action) {
        Grant::Always => Decision::Allow,
        Grant::Never => Decision::Deny(DenyReason::Forbidden),
        Grant::OwnerOnly => match resource {
            // Collection actions with an owner grant are narrowed by `list_scope`.
            Resource::None => Decision::Allow,
            Resource::Task { creator_id } if creator_id == caller.id => Decision::Allow,
            Resource::Task { .. } | Resource::User { .. } => {
                Decision::Deny(DenyReason::Forbidden)
            }
        },
    }
}

/// Which tasks a caller's listing covers
pub fn list_scope(caller: &Caller) -> TaskScope {
    match grant(caller.role, Action::ListTasks) {
        Grant::Always => TaskScope::All,
        Grant::OwnerOnly | Grant::Never => TaskScope::CreatedBy(caller.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [Action; 9] = [
        Action::ListTasks,
        Action::CreateTask,
        Action::ReadTask,
        Action::UpdateTask,
        Action::DeleteTask,
        Action::ListUsers,
        Action::ReadUser,
        Action::DeleteUser,
        Action::ChangeRole,
    ];

    fn caller(role: Role) -> Caller {
        Caller::new(10, "caller", role)
    }

    fn resource_for(action: Action, owner: i64) -> Resource {
        match action {
            Action::ListTasks | Action::CreateTask | Action::ListUsers => Resource::None,
            Action::ReadTask | Action::UpdateTask | Action::DeleteTask => {
                Resource::Task { creator_id: owner }
            }
            Action::ReadUser | Action::DeleteUser | Action::ChangeRole => {
                Resource::User { id: owner }
            }
        }
    }

    #[test]
    fn test_unauthenticated_is_rejected_for_every_action() {
        for action in ALL_ACTIONS {
            assert_eq!(
                authorize(None, action, resource_for(action, 10)),
                Decision::Deny(DenyReason::Unauthenticated),
                "{action:?}"
            );
        }
    }

    #[test]
    fn test_admin_is_allowed_everything() {
        let admin = caller(Role::Admin);
        for action in ALL_ACTIONS {
            assert!(authorize(Some(&admin), action, resource_for(action, 99)).is_allowed());
        }
    }

    #[test]
    fn test_manager_grants() {
        let manager = caller(Role::Manager);
        let expectations = [
            (Action::ListTasks, true),
            (Action::CreateTask, true),
            (Action::ReadTask, true),
            (Action::UpdateTask, true),
            (Action::DeleteTask, true),
            (Action::ListUsers, true),
            (Action::ReadUser, true),
            (Action::DeleteUser, false),
            (Action::ChangeRole, false),
        ];

        for (action, allowed) in expectations {
            let decision = authorize(Some(&manager), action, resource_for(action, 99));
            assert_eq!(decision.is_allowed(), allowed, "{action:?}");
        }
    }

    #[test]
    fn test_user_on_own_task() {
        let user = caller(Role::User);
        let own = Resource::Task { creator_id: user.id };

        assert!(authorize(Some(&user), Action::ReadTask, own).is_allowed());
        assert!(authorize(Some(&user), Action::UpdateTask, own).is_allowed());
        assert_eq!(
            authorize(Some(&user), Action::DeleteTask, own),
            Decision::Deny(DenyReason::Forbidden)
        );
    }

    #[test]
    fn test_user_on_foreign_task() {
        let user = caller(Role::User);
        let foreign = Resource::Task { creator_id: 11 };

        for action in [Action::ReadTask, Action::UpdateTask, Action::DeleteTask] {
            assert_eq!(
                authorize(Some(&user), action, foreign),
                Decision::Deny(DenyReason::Forbidden),
                "{action:?}"
            );
        }
    }

    #[test]
    fn test_user_cannot_touch_user_records() {
        let user = caller(Role::User);
        let own_record = Resource::User { id: user.id };

        for action in [Action::ReadUser, Action::DeleteUser, Action::ChangeRole] {
            assert!(authorize(Some(&user), action, own_record).is_denied());
        }
        assert!(authorize(Some(&user), Action::ListUsers, Resource::None).is_denied());
    }

    #[test]
    fn test_user_may_create_and_list() {
        let user = caller(Role::User);
        assert!(authorize(Some(&user), Action::CreateTask, Resource::None).is_allowed());
        assert!(authorize(Some(&user), Action::ListTasks, Resource::None).is_allowed());
    }

    #[test]
    fn test_list_scope_by_role() {
        assert_eq!(list_scope(&caller(Role::Admin)), TaskScope::All);
        assert_eq!(list_scope(&caller(Role::Manager)), TaskScope::All);
        assert_eq!(list_scope(&caller(Role::User)), TaskScope::CreatedBy(10));
    }
}
