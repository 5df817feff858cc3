//! Task endpoints. Every handler acts on the caller's own tasks only.
//!
//! Reads report another user's task as `404`; update and delete on another
//! user's task answer `403`.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{CreateTaskRequest, ListParams, Surface, Task, UpdateMode, UpdateTaskRequest};

use super::{json_body, parse_task_id};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// `GET /api/tasks/?search-area=&sort=&order=`
///
/// Newest-updated first unless `order=asc`.
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Task>>, AppError> {
    let query = params.to_query(principal.id, Surface::Api);
    tracing::debug!(user_id = %principal.id, ?query, "Listing tasks");
    let tasks = state.tasks.list(&query).await?;
    Ok(Json(tasks))
}

pub async fn get_task(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let id = parse_task_id(&id)?;
    let task = state
        .tasks
        .get(id, principal.id)
        .await
        .map_err(|error| AppError::from(error).conceal_ownership())?;
    Ok(Json(task))
}

/// `POST /api/tasks/create/`: `201` with the stored task.
pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let draft = json_body(payload)?.validate()?;
    let task = state.tasks.create(principal.id, draft).await?;
    tracing::info!(user_id = %principal.id, task_id = %task.id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// `PUT /api/tasks/update/:id/`: `title` is required.
pub async fn replace_task(
    state: State<AppState>,
    user: CurrentUser,
    id: Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, AppError> {
    update(state, user, id, payload, UpdateMode::Full).await
}

/// `PATCH /api/tasks/update/:id/`: only the supplied fields change.
pub async fn patch_task(
    state: State<AppState>,
    user: CurrentUser,
    id: Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, AppError> {
    update(state, user, id, payload, UpdateMode::Partial).await
}

async fn update(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
    mode: UpdateMode,
) -> Result<Json<Task>, AppError> {
    let id = parse_task_id(&id)?;
    let changes = json_body(payload)?.validate(mode)?;
    let task = state.tasks.update(id, principal.id, changes).await?;
    tracing::info!(user_id = %principal.id, task_id = %task.id, ?mode, "Task updated");
    Ok(Json(task))
}

/// `DELETE /api/tasks/delete/:id/`: empty `204`.
pub async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_task_id(&id)?;
    state.tasks.delete(id, principal.id).await?;
    tracing::info!(user_id = %principal.id, task_id = %id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}
