//! JSON API, mounted under `/api`.
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `/tasks/` | [`tasks::list_tasks`] |
//! | GET | `/tasks/:id/` | [`tasks::get_task`] |
//! | POST | `/tasks/create/` | [`tasks::create_task`] |
//! | PUT, PATCH | `/tasks/update/:id/` | [`tasks::replace_task`], [`tasks::patch_task`] |
//! | DELETE | `/tasks/delete/:id/` | [`tasks::delete_task`] |
//! | POST | `/login/`, `/logout/`, `/register/` | [`account`] |

pub mod account;
pub mod tasks;

use axum::{
    extract::rejection::JsonRejection,
    routing::{delete, get, post, put},
    Json, Router,
};
use shared::TaskId;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tasks/", get(tasks::list_tasks))
        .route("/tasks/create/", post(tasks::create_task))
        .route("/tasks/:id/", get(tasks::get_task))
        .route(
            "/tasks/update/:id/",
            put(tasks::replace_task).patch(tasks::patch_task),
        )
        .route("/tasks/delete/:id/", delete(tasks::delete_task))
        .route("/login/", post(account::login))
        .route("/logout/", post(account::logout))
        .route("/register/", post(account::register))
}

/// Path ids that are not UUIDs name no task at all.
pub(crate) fn parse_task_id(raw: &str) -> Result<TaskId, AppError> {
    TaskId::parse_str(raw).map_err(|_| AppError::NotFound)
}

pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::MalformedBody(rejection.body_text()))
}
