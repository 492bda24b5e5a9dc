/// Credential service
///
/// Registration, login checks, caller resolution and admin user management.

use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use super::error::{ServiceError, ServiceResult};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::policy::{authorize, Action, Caller, Resource};
use crate::models::user::{NewUser, RegisterUser, Role, User, UserResponse};
use crate::store::UserStore;

/// Seed account created at start-up when configured
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Registers a new account with role `user`
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, `EmailTaken` / `UsernameTaken` when
    /// the address or name is in use (also when a concurrent registration
    /// wins the race).
    pub async fn register(&self, input: RegisterUser) -> ServiceResult<UserResponse> {
        input.validate()?;

        if self.store.find_user_by_email(&input.email).await?.is_some() {
            return Err(ServiceError::EmailTaken);
        }
        if self
            .store
            .find_user_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(ServiceError::UsernameTaken);
        }

        let password_hash = hash_password(&input.password)?;
        let user = self
            .store
            .insert_user(NewUser {
                username: input.username,
                email: input.email,
                password_hash,
                role: Role::User,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user.into())
    }

    /// Checks a username/password pair
    ///
    /// Returns `None` for an unknown user and for a wrong password alike.
    pub async fn authenticate(&self, username: &str, password: &str) -> ServiceResult<Option<User>> {
        let Some(user) = self.store.find_user_by_username(username).await? else {
            debug!(username, "Login for unknown user");
            return Ok(None);
        };

        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            debug!(user_id = user.id, "Login with wrong password");
            Ok(None)
        }
    }

    /// Resolves a token subject to a caller
    ///
    /// A token for a user that has since been deleted resolves to `None`.
    pub async fn resolve_caller(&self, username: &str) -> ServiceResult<Option<Caller>> {
        Ok(self
            .store
            .find_user_by_username(username)
            .await?
            .map(|user| Caller::from(&user)))
    }

    pub async fn get(&self, caller: &Caller, id: i64) -> ServiceResult<UserResponse> {
        ServiceError::check(
            authorize(Some(caller), Action::ReadUser, Resource::User { id }),
            "read users",
        )?;

        self.store
            .find_user(id)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| ServiceError::not_found("user", id))
    }

    pub async fn list(&self, caller: &Caller) -> ServiceResult<Vec<UserResponse>> {
        ServiceError::check(
            authorize(Some(caller), Action::ListUsers, Resource::None),
            "list users",
        )?;

        let users = self.store.list_users().await?;
        Ok(users.iter().map(UserResponse::from).collect())
    }

    /// Deletes a user
    ///
    /// # Errors
    ///
    /// `Conflict` while the user is the creator of any task.
    pub async fn delete(&self, caller: &Caller, id: i64) -> ServiceResult<UserResponse> {
        ServiceError::check(
            authorize(Some(caller), Action::DeleteUser, Resource::User { id }),
            "delete users",
        )?;

        let removed = self
            .store
            .delete_user(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", id))?;

        info!(user_id = id, caller = %caller.username, "User deleted");
        Ok(removed.into())
    }

    pub async fn change_role(
        &self,
        caller: &Caller,
        id: i64,
        role: Role,
    ) -> ServiceResult<UserResponse> {
        ServiceError::check(
            authorize(Some(caller), Action::ChangeRole, Resource::User { id }),
            "change roles",
        )?;

        let user = self
            .store
            .set_role(id, role)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", id))?;

        info!(user_id = id, role = %role, caller = %caller.username, "User role changed");
        Ok(user.into())
    }

    /// Ensures the seed admin exists
    ///
    /// An existing account with the same username is promoted to admin if
    /// needed; its password is left alone.
    pub async fn bootstrap_admin(&self, seed: &AdminSeed) -> ServiceResult<UserResponse> {
        if let Some(existing) = self.store.find_user_by_username(&seed.username).await? {
            if existing.role == Role::Admin {
                debug!(user_id = existing.id, "Bootstrap admin already present");
                return Ok(existing.into());
            }

            warn!(user_id = existing.id, "Promoting existing bootstrap account to admin");
            let promoted = self
                .store
                .set_role(existing.id, Role::Admin)
                .await?
                .ok_or_else(|| ServiceError::not_found("user", existing.id))?;
            return Ok(promoted.into());
        }

        let password_hash = hash_password(&seed.password)?;
        let admin = self
            .store
            .insert_user(NewUser {
                username: seed.username.clone(),
                email: seed.email.clone(),
                password_hash,
                role: Role::Admin,
            })
            .await?;

        info!(user_id = admin.id, username = %admin.username, "Bootstrap admin created");
        Ok(admin.into())
    }

    pub async fn ping(&self) -> ServiceResult<()> {
        Ok(self.store.ping().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn service() -> (UserService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (UserService::new(store.clone()), store)
    }

    fn registration(username: &str, email: &str) -> RegisterUser {
        RegisterUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
        }
    }

    async fn seeded_caller(store: &InMemoryStore, username: &str, role: Role) -> Caller {
        let user = store
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: hash_password("password123").unwrap(),
                role,
            })
            .await
            .unwrap();
        Caller::from(&user)
    }

    #[tokio::test]
    async fn test_register_always_creates_plain_user() {
        let (users, _) = service();
        let created = users
            .register(registration("alice", "alice@example.com"))
            .await
            .unwrap();

        assert_eq!(created.role, Role::User);
        assert_eq!(created.username, "alice");
    }

    #[tokio::test]
    async fn test_register_same_email_twice() {
        let (users, store) = service();
        let first = users
            .register(registration("alice", "alice@example.com"))
            .await
            .unwrap();

        let second = users
            .register(registration("alice2", "alice@example.com"))
            .await;
        assert!(matches!(second, Err(ServiceError::EmailTaken)));

        let still_there = store.find_user(first.id).await.unwrap();
        assert_eq!(still_there.map(|u| u.email), Some("alice@example.com".to_string()));
    }

    #[tokio::test]
    async fn test_register_same_username_twice() {
        let (users, _) = service();
        users
            .register(registration("alice", "alice@example.com"))
            .await
            .unwrap();

        let second = users.register(registration("alice", "other@example.com")).await;
        assert!(matches!(second, Err(ServiceError::UsernameTaken)));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_input() {
        let (users, _) = service();
        let result = users.register(registration("al", "not-an-email")).await;

        let Err(ServiceError::Validation(fields)) = result else {
            panic!("expected validation error");
        };
        assert_eq!(fields.len(), 2);
    }

    #[tokio::test]
    async fn test_authenticate_does_not_distinguish_failures() {
        let (users, _) = service();
        users
            .register(registration("alice", "alice@example.com"))
            .await
            .unwrap();

        let ok = users.authenticate("alice", "password123").await.unwrap();
        assert_eq!(ok.map(|u| u.username), Some("alice".to_string()));

        assert!(users.authenticate("alice", "wrong-pass").await.unwrap().is_none());
        assert!(users.authenticate("nobody", "password123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_user_requires_admin_or_manager() {
        let (users, store) = service();
        let admin = seeded_caller(&store, "root", Role::Admin).await;
        let manager = seeded_caller(&store, "boss", Role::Manager).await;
        let plain = seeded_caller(&store, "joe", Role::User).await;

        assert!(users.get(&admin, plain.id).await.is_ok());
        assert!(users.get(&manager, plain.id).await.is_ok());
        assert!(matches!(
            users.get(&plain, plain.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            users.get(&admin, 999).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_user_is_admin_only() {
        let (users, store) = service();
        let admin = seeded_caller(&store, "root", Role::Admin).await;
        let manager = seeded_caller(&store, "boss", Role::Manager).await;
        let plain = seeded_caller(&store, "joe", Role::User).await;

        assert!(matches!(
            users.delete(&manager, plain.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(store.find_user(plain.id).await.unwrap().is_some());

        let removed = users.delete(&admin, plain.id).await.unwrap();
        assert_eq!(removed.id, plain.id);
        assert!(store.find_user(plain.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_role() {
        let (users, store) = service();
        let admin = seeded_caller(&store, "root", Role::Admin).await;
        let plain = seeded_caller(&store, "joe", Role::User).await;

        let promoted = users
            .change_role(&admin, plain.id, Role::Manager)
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Manager);

        assert!(matches!(
            users.change_role(&plain, admin.id, Role::User).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let (users, store) = service();
        let seed = AdminSeed {
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password: "admin-password".to_string(),
        };

        let first = users.bootstrap_admin(&seed).await.unwrap();
        let second = users.bootstrap_admin(&seed).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.role, Role::Admin);
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_caller() {
        let (users, store) = service();
        let joe = seeded_caller(&store, "joe", Role::User).await;

        assert_eq!(users.resolve_caller("joe").await.unwrap(), Some(joe));
        assert_eq!(users.resolve_caller("ghost").await.unwrap(), None);
    }
}
