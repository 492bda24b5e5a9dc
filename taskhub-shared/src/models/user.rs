/// User model and database operations
///
/// Users are the identities behind every request. A user has a unique
/// username, a unique email, an Argon2id password hash and a single role.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('admin', 'manager', 'user');
///
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     username VARCHAR(50) NOT NULL CONSTRAINT users_username_key UNIQUE,
///     email VARCHAR(255) NOT NULL CONSTRAINT users_email_key UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'user',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::models::user::{NewUser, Role, User};
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, NewUser {
///     username: "jdoe".to_string(),
///     email: "jdoe@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: Role::User,
/// }).await?;
///
/// let found = User::find_by_username(&pool, "jdoe").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

/// Closed set of roles
///
/// Visibility and mutation rights are derived from the role alone;
/// see [`crate::auth::policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full control over users and tasks
    Admin,

    /// Sees and edits every task, reads users
    Manager,

    /// Works on own tasks only
    User,
}

impl Role {
    /// Wire/database name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account
///
/// `password_hash` never leaves the server; responses use [`UserResponse`].
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: i64,

    /// Login name, unique
    pub username: String,

    /// Email address, unique; status notifications are sent here
    pub email: String,

    /// Argon2id password hash (PHC string)
    pub password_hash: String,

    /// Role
    pub role: Role,

    /// When the account was created
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a user
///
/// Carries an already-hashed password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Registration payload
///
/// Registration always creates a [`Role::User`]; roles are changed by an admin.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterUser {
    /// Login name
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,

    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Plaintext password, hashed before storage
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Returns an error if the username or email is already taken
    /// (unique constraint violation) or the database is unreachable.
    pub async fn create(pool: &PgPool, data: NewUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.username)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.role)
            .fetch_one(pool)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by username
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Loads every user whose ID is in `ids`
    ///
    /// Unknown IDs are silently absent from the result; callers compare
    /// lengths when they need to detect them.
    pub async fn find_many(pool: &PgPool, ids: &[i64]) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1) ORDER BY id");

        sqlx::query_as::<_, User>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Lists all users ordered by ID
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");

        sqlx::query_as::<_, User>(&query).fetch_all(pool).await
    }

    /// Changes a user's role
    ///
    /// Returns `None` if the user doesn't exist.
    pub async fn set_role(pool: &PgPool, id: i64, role: Role) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(role)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a user and returns the removed row
    ///
    /// Assignee links cascade; the delete is rejected by the database while
    /// the user is still the creator of any task.
    pub async fn delete(conn: &mut PgConnection, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 7,
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Manager,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::Manager).unwrap(), "\"manager\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
        assert!(serde_json::from_str::<Role>("\"owner\"").is_err());
    }

    #[test]
    fn test_role_default_is_user() {
        assert_eq!(Role::default(), Role::User);
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn test_user_response_hides_password_hash() {
        let response = UserResponse::from(sample_user());
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["role"], "manager");
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_register_user_validation() {
        let valid = RegisterUser {
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            password: "long-enough".to_string(),
        };
        assert!(valid.validate().is_ok());

        let invalid = RegisterUser {
            username: "jd".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
        };
        let errors = invalid.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
