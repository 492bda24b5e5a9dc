/// Task endpoints
///
/// All routes require a bearer token. Visibility follows the caller's role:
/// plain users only see and edit tasks they created; admins and managers see
/// everything; only admins and managers delete.
///
/// # Endpoints
///
/// - `POST /tasks` - Create a task owned by the caller
/// - `GET /tasks` - List visible tasks
/// - `GET /tasks/:id` - Get a task
/// - `PUT /tasks/:id` - Partially update a task
/// - `DELETE /tasks/:id` - Delete a task
///
/// # Example
///
/// ```text
/// PUT /tasks/7
/// Authorization: Bearer eyJ...
///
/// { "status": "done", "assignees": [2, 5] }
/// ```

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
use taskhub_shared::{
    auth::policy::Caller,
    models::task::{CreateTask, TaskResponse, UpdateTask},
};

/// Creates a task
///
/// # Errors
///
/// - `400 Bad Request`: Unknown assignee IDs
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_task(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(req): ApiJson<CreateTask>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let task = state.tasks.create(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    Ok(Json(state.tasks.list(&caller).await?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<TaskResponse>> {
    Ok(Json(state.tasks.get(&caller, id).await?))
}

/// Applies a partial update
///
/// Absent or `null` fields are left unchanged; `assignees`, when present,
/// replaces the whole set. A status change emails the task's creator.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown assignee IDs (nothing is changed)
/// - `403 Forbidden`: Caller may not edit this task
/// - `404 Not Found`: No such task
pub async fn update_task(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateTask>,
) -> ApiResult<Json<TaskResponse>> {
    Ok(Json(state.tasks.update(&caller, id, req).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<TaskResponse>> {
    Ok(Json(state.tasks.delete(&caller, id).await?))
}
