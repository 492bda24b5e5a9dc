/// Service error taxonomy
///
/// Transport layers map these variants onto their own status codes; the
/// services never deal in HTTP.

use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::auth::password::PasswordError;
use crate::auth::policy::{Decision, DenyReason};
use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One invalid input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Errors returned by the lifecycle services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("username already taken")]
    UsernameTaken,

    #[error("conflict: {0}")]
    Conflict(String),

    /// Assignee IDs that don't reference a user
    #[error("invalid assignees: {0:?}")]
    InvalidAssignees(Vec<i64>),

    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl ServiceError {
    pub fn not_found(what: &str, id: i64) -> Self {
        ServiceError::NotFound(format!("{what} {id}"))
    }

    /// Turns a policy decision into a result
    pub fn check(decision: Decision, what: &str) -> ServiceResult<()> {
        match decision {
            Decision::Allow => Ok(()),
            Decision::Deny(DenyReason::Unauthenticated) => Err(ServiceError::Unauthenticated),
            Decision::Deny(DenyReason::Forbidden) => {
                Err(ServiceError::Forbidden(format!("not allowed to {what}")))
            }
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingUsers(ids) => ServiceError::InvalidAssignees(ids),
            StoreError::DuplicateEmail => ServiceError::EmailTaken,
            StoreError::DuplicateUsername => ServiceError::UsernameTaken,
            StoreError::CreatorMissing(_) => ServiceError::Unauthenticated,
            StoreError::UserHasTasks => {
                ServiceError::Conflict("user is the creator of existing tasks".to_string())
            }
            other => ServiceError::Store(other),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));

        ServiceError::Validation(fields)
    }
}
