/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: bearer access tokens (HS256, username subject)
/// - [`policy`]: the role-based access-control table
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::auth::password::{hash_password, verify_password};
/// use taskhub_shared::auth::jwt::{create_token, Claims};
/// use chrono::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let claims = Claims::new("jdoe", Duration::minutes(30));
/// let token = create_token(&claims, "secret-key-at-least-32-bytes-long!!")?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod password;
pub mod policy;
