//! Task pages. A task that is missing or owned by someone else is a `404` here.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use shared::{CreateTaskRequest, FieldErrors, ListParams, Surface, Task, TaskChanges, TaskId};

use super::context::{list_location, ListContext};
use super::{html_with_status, render, PageResult, PageUser};
use crate::api::parse_task_id;
use crate::auth::Principal;
use crate::error::AppError;
use crate::state::AppState;

/// Fields of the create and update forms, exactly as the browser posts them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskForm {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Present (usually `on`) only when the checkbox is ticked.
    #[serde(default)]
    pub completed: Option<String>,
}

impl TaskForm {
    pub fn is_completed(&self) -> bool {
        matches!(self.completed.as_deref(), Some("on" | "true" | "1"))
    }

    fn from_task(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            description: task.description.clone(),
            completed: task.completed.then(|| "on".to_string()),
        }
    }

    /// An empty form field counts as missing.
    fn to_request(&self) -> CreateTaskRequest {
        CreateTaskRequest {
            title: self
                .title
                .clone()
                .filter(|title| !title.trim().is_empty()),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string),
            completed: Some(self.is_completed()),
        }
    }
}

/// How a successful delete answers: a browser form gets redirected back to
/// the list, a scripted `DELETE` gets an empty `204`.
#[derive(Debug)]
pub enum DeleteResponse {
    Redirect(String),
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            DeleteResponse::Redirect(location) => Redirect::to(&location).into_response(),
            DeleteResponse::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

fn with_params(path: &str, params: &ListParams) -> String {
    format!("{path}?{}", params.redirect_query(Surface::Html))
}

async fn owned_task(state: &AppState, principal: &Principal, raw_id: &str) -> PageResult<Task> {
    let id = parse_task_id(raw_id)?;
    state
        .tasks
        .get(id, principal.id)
        .await
        .map_err(|error| AppError::from(error).conceal_ownership().into())
}

pub async fn list(
    State(state): State<AppState>,
    PageUser(principal): PageUser,
    Query(params): Query<ListParams>,
) -> PageResult<Html<String>> {
    let context = ListContext::build(&state, &principal, &params).await?;
    Ok(Html(render::list_page(&principal, &context)))
}

pub async fn detail(
    State(state): State<AppState>,
    PageUser(principal): PageUser,
    Path(id): Path<String>,
) -> PageResult<Html<String>> {
    let task = owned_task(&state, &principal, &id).await?;
    Ok(Html(render::detail_page(&principal, &task)))
}

pub async fn create_form(
    State(state): State<AppState>,
    PageUser(principal): PageUser,
    Query(params): Query<ListParams>,
) -> PageResult<Html<String>> {
    let context = ListContext::build(&state, &principal, &params).await?;
    Ok(Html(render::task_form_page(
        &principal,
        "New task",
        &with_params("/task-create/", &params),
        &TaskForm::default(),
        &FieldErrors::new(),
        &context,
    )))
}

pub async fn create(
    State(state): State<AppState>,
    PageUser(principal): PageUser,
    Query(params): Query<ListParams>,
    Form(form): Form<TaskForm>,
) -> PageResult {
    let draft = match form.to_request().validate() {
        Ok(draft) => draft,
        Err(errors) => {
            let context = ListContext::build(&state, &principal, &params).await?;
            let html = render::task_form_page(
                &principal,
                "New task",
                &with_params("/task-create/", &params),
                &form,
                &errors,
                &context,
            );
            return Ok(html_with_status(StatusCode::BAD_REQUEST, html));
        }
    };

    let task = state.tasks.create(principal.id, draft).await?;
    tracing::info!(user_id = %principal.id, task_id = %task.id, "Task created from form");
    Ok(Redirect::to(&list_location(&params)).into_response())
}

pub async fn update_form(
    State(state): State<AppState>,
    PageUser(principal): PageUser,
    Path(id): Path<String>,
    Query(params): Query<ListParams>,
) -> PageResult<Html<String>> {
    let task = owned_task(&state, &principal, &id).await?;
    let context = ListContext::build(&state, &principal, &params).await?;
    Ok(Html(render::task_form_page(
        &principal,
        "Edit task",
        &with_params(&format!("/task-update/{}/", task.id), &params),
        &TaskForm::from_task(&task),
        &FieldErrors::new(),
        &context,
    )))
}

pub async fn update(
    State(state): State<AppState>,
    PageUser(principal): PageUser,
    Path(id): Path<String>,
    Query(params): Query<ListParams>,
    Form(form): Form<TaskForm>,
) -> PageResult {
    let task = owned_task(&state, &principal, &id).await?;

    let draft = match form.to_request().validate() {
        Ok(draft) => draft,
        Err(errors) => {
            let context = ListContext::build(&state, &principal, &params).await?;
            let html = render::task_form_page(
                &principal,
                "Edit task",
                &with_params(&format!("/task-update/{}/", task.id), &params),
                &form,
                &errors,
                &context,
            );
            return Ok(html_with_status(StatusCode::BAD_REQUEST, html));
        }
    };

    state
        .tasks
        .update(task.id, principal.id, TaskChanges::from(draft))
        .await
        .map_err(|error| AppError::from(error).conceal_ownership())?;
    tracing::info!(user_id = %principal.id, task_id = %task.id, "Task updated from form");
    Ok(Redirect::to(&list_location(&params)).into_response())
}

pub async fn confirm_delete(
    State(state): State<AppState>,
    PageUser(principal): PageUser,
    Path(id): Path<String>,
    Query(params): Query<ListParams>,
) -> PageResult<Html<String>> {
    let task = owned_task(&state, &principal, &id).await?;
    let context = ListContext::build(&state, &principal, &params).await?;
    Ok(Html(render::delete_page(
        &principal,
        &task,
        &with_params(&format!("/task-delete/{}/", task.id), &params),
        &context,
    )))
}

pub async fn delete_and_redirect(
    State(state): State<AppState>,
    PageUser(principal): PageUser,
    Path(id): Path<String>,
    Query(params): Query<ListParams>,
) -> PageResult<DeleteResponse> {
    let id = parse_task_id(&id)?;
    remove(&state, &principal, id).await?;
    Ok(DeleteResponse::Redirect(list_location(&params)))
}

pub async fn delete_no_content(
    State(state): State<AppState>,
    PageUser(principal): PageUser,
    Path(id): Path<String>,
) -> PageResult<DeleteResponse> {
    let id = parse_task_id(&id)?;
    remove(&state, &principal, id).await?;
    Ok(DeleteResponse::NoContent)
}

async fn remove(state: &AppState, principal: &Principal, id: TaskId) -> PageResult<()> {
    state
        .tasks
        .delete(id, principal.id)
        .await
        .map_err(|error| AppError::from(error).conceal_ownership())?;
    tracing::info!(user_id = %principal.id, task_id = %id, "Task deleted from page");
    Ok(())
}
