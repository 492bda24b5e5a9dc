/// Bearer access tokens
///
/// Successful login issues an HS256-signed JWT whose subject is the
/// username. Tokens expire after a fixed window (30 minutes by default) and
/// carry the issuer `taskhub`.
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::jwt::{create_token, validate_token, Claims};
/// use chrono::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "test-secret-key-at-least-32-bytes-long";
/// let claims = Claims::new("jdoe", Duration::minutes(30));
/// let token = create_token(&claims, secret)?;
///
/// let validated = validate_token(&token, secret)?;
/// assert_eq!(validated.sub, "jdoe");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Issuer claim stamped on every token
pub const ISSUER: &str = "taskhub";

/// Default access token lifetime in minutes
pub const DEFAULT_EXPIRE_MINUTES: i64 = 30;

/// Token type reported by the login endpoint
pub const TOKEN_TYPE: &str = "bearer";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, issuer or format check failed
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - username
    pub sub: String,

    /// Issuer - always "taskhub"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl Claims {
    /// Creates claims for `username` valid for `expires_in`
    pub fn new(username: impl Into<String>, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: username.into(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
        }
    }

    /// Checks if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims into a token
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a token and returns its claims
///
/// Checks signature, expiry, not-before and issuer.
///
/// # Errors
///
/// Returns `JwtError::Expired` for an expired token and
/// `JwtError::ValidationError` for anything else.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}
