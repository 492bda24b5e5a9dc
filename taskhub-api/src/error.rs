/// Error handling for the API server
///
/// All handlers return `Result<T, ApiError>`, which converts into a JSON
/// error body with the matching status code:
///
/// ```json
/// { "error": "not_found", "message": "task 7 not found" }
/// ```
///
/// # Example
///
/// ```
/// use taskhub_api::error::{ApiError, ApiResult};
/// use axum::Json;
///
/// async fn handler(found: bool) -> ApiResult<Json<&'static str>> {
///     if !found {
///         return Err(ApiError::NotFound("widget not found".to_string()));
///     }
///     Ok(Json("widget"))
/// }
/// ```

use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use taskhub_shared::service::{FieldError, ServiceError};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400), e.g. email taken or unknown assignees
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409)
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl From<FieldError> for ValidationErrorDetail {
    fn from(err: FieldError) -> Self {
        Self {
            field: err.field,
            message: err.message,
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let challenge = matches!(self, ApiError::Unauthorized(_));

        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        let mut response = (status, body).into_response();
        if challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON that doesn't fit the request type
            JsonRejection::JsonDataError(e) => ApiError::ValidationError(vec![
                ValidationErrorDetail {
                    field: "body".to_string(),
                    message: e.body_text(),
                },
            ]),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        match rejection {
            FormRejection::FailedToDeserializeForm(e) => {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: "form".to_string(),
                    message: e.body_text(),
                }])
            }
            FormRejection::FailedToDeserializeFormBody(e) => {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: "form".to_string(),
                    message: e.body_text(),
                }])
            }
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthenticated => {
                ApiError::Unauthorized("Could not validate credentials".to_string())
            }
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            ServiceError::EmailTaken => ApiError::BadRequest("Email already registered".to_string()),
            ServiceError::UsernameTaken => {
                ApiError::BadRequest("Username already taken".to_string())
            }
            ServiceError::InvalidAssignees(ids) => {
                let ids: Vec<String> = ids.iter().map(i64::to_string).collect();
                ApiError::BadRequest(format!("Invalid assignees: {}", ids.join(", ")))
            }
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Validation(fields) => {
                ApiError::ValidationError(fields.into_iter().map(Into::into).collect())
            }
            err @ (ServiceError::Store(_) | ServiceError::Password(_)) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

/// Convert JWT errors to API errors
impl From<taskhub_shared::auth::jwt::JwtError> for ApiError {
    fn from(err: taskhub_shared::auth::jwt::JwtError) -> Self {
        match err {
            taskhub_shared::auth::jwt::JwtError::Expired => {
                ApiError::Unauthorized("Token expired".to_string())
            }
            taskhub_shared::auth::jwt::JwtError::CreateError(msg) => ApiError::InternalError(msg),
            taskhub_shared::auth::jwt::JwtError::ValidationError(_) => {
                ApiError::Unauthorized("Could not validate credentials".to_string())
            }
        }
    }
}
