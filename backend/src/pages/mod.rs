//! Server-rendered HTML pages bound to the session principal.
//!
//! Anonymous visitors of a task page are sent to `/login/?next=<path>`.

pub mod account;
pub mod context;
pub mod render;
pub mod tasks;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_sessions::Session;

use crate::auth::{current_principal, Principal};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::StoreError;

pub use context::ListContext;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(tasks::list))
        .route("/tasks/", get(tasks::list))
        .route("/task/:id/", get(tasks::detail))
        .route("/task-create/", get(tasks::create_form).post(tasks::create))
        .route(
            "/task-update/:id/",
            get(tasks::update_form).post(tasks::update),
        )
        .route(
            "/task-delete/:id/",
            get(tasks::confirm_delete)
                .post(tasks::delete_and_redirect)
                .delete(tasks::delete_no_content),
        )
        .route("/login/", get(account::login_form).post(account::login))
        .route("/logout/", get(account::logout).post(account::logout))
        .route(
            "/register/",
            get(account::register_form).post(account::register),
        )
}

/// `path?query` with `params` form-encoded; the bare path when there is nothing to add.
pub(crate) fn with_query(path: &str, params: &impl Serialize) -> String {
    match serde_urlencoded::to_string(params) {
        Ok(query) if !query.is_empty() => format!("{path}?{query}"),
        Ok(_) => path.to_string(),
        Err(error) => {
            tracing::warn!(%error, path, "Dropping unencodable query");
            path.to_string()
        }
    }
}

/// Login URL that returns the visitor to `parts` afterwards.
fn login_location(parts: &Parts) -> String {
    let target = parts
        .uri
        .path_and_query()
        .map(|path| path.as_str())
        .unwrap_or("/");
    with_query("/login/", &[("next", target)])
}

/// The principal of an HTML request. Anonymous requests get a `303` to the login page.
#[derive(Debug, Clone)]
pub struct PageUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for PageUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        match current_principal(&session).await {
            Ok(Some(principal)) => Ok(PageUser(principal)),
            Ok(None) => Err(Redirect::to(&login_location(parts)).into_response()),
            Err(error) => Err(PageError(error).into_response()),
        }
    }
}

/// An [`AppError`] rendered as an HTML page instead of JSON.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(error: AppError) -> Self {
        Self(error)
    }
}

impl From<StoreError> for PageError {
    fn from(error: StoreError) -> Self {
        Self(AppError::from(error))
    }
}

impl From<tower_sessions::session::Error> for PageError {
    fn from(error: tower_sessions::session::Error) -> Self {
        Self(AppError::from(error))
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let error = self.0;
        if matches!(error, AppError::NotAuthenticated) {
            return Redirect::to("/login/").into_response();
        }

        let status = error.status();
        if status.is_server_error() {
            tracing::error!(error = %error, "Page request failed");
        }
        (status, Html(render::error_page(status, &error.detail()))).into_response()
    }
}

pub type PageResult<T = Response> = Result<T, PageError>;

/// Renders `html` with a non-200 status.
pub(crate) fn html_with_status(status: StatusCode, html: String) -> Response {
    (status, Html(html)).into_response()
}
