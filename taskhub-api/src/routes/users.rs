/// User endpoints
///
/// - `POST /users` - Register (public)
/// - `GET /users` - List users (admin, manager)
/// - `GET /users/:id` - Get user (admin, manager)
/// - `DELETE /users/:id` - Delete user (admin)
/// - `PATCH /users/:id/role` - Change role (admin)

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{ApiJson, ApiPath},
};
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use taskhub_shared::{
    auth::policy::Caller,
    models::user::{RegisterUser, Role, UserResponse},
};

/// Role change request
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// Registers a new user with role `user`
///
/// # Errors
///
/// - `400 Bad Request`: Email already registered or username taken
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterUser>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let user = state.users.register(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    Ok(Json(state.users.list(&caller).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<UserResponse>> {
    Ok(Json(state.users.get(&caller, id).await?))
}

/// Deletes a user and returns the removed record
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
/// - `404 Not Found`: No such user
/// - `409 Conflict`: User still created tasks
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<UserResponse>> {
    Ok(Json(state.users.delete(&caller, id).await?))
}

pub async fn change_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<RoleRequest>,
) -> ApiResult<Json<UserResponse>> {
    Ok(Json(state.users.change_role(&caller, id, req.role).await?))
}
