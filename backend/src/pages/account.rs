use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
    Form,
};
use serde::Deserialize;
use shared::{FieldErrors, LoginRequest, RegisterRequest};
use tower_sessions::Session;

use super::{html_with_status, render, PageResult};
use crate::auth::{self, current_principal, Principal};
use crate::error::AppError;
use crate::state::AppState;

const HOME: &str = "/tasks/";
const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

impl NextParam {
    /// Only same-site paths are followed after login. Control characters
    /// never reach a `Location` header.
    fn local(&self) -> Option<&str> {
        self.next.as_deref().filter(|next| {
            next.starts_with('/')
                && !next.starts_with("//")
                && !next.contains('\\')
                && !next.chars().any(char::is_control)
        })
    }
}

pub async fn login_form(session: Session, Query(next): Query<NextParam>) -> PageResult {
    if current_principal(&session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }
    Ok(Html(render::login_page("", next.local(), &FieldErrors::new())).into_response())
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Query(next): Query<NextParam>,
    Form(form): Form<LoginRequest>,
) -> PageResult {
    if current_principal(&session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }

    let username = form.username.clone().unwrap_or_default();
    let rejected = |errors: &FieldErrors| {
        html_with_status(
            StatusCode::BAD_REQUEST,
            render::login_page(&username, next.local(), errors),
        )
    };

    let credentials = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => return Ok(rejected(&errors)),
    };

    match auth::authenticate(state.users.as_ref(), credentials).await {
        Ok(principal) => {
            auth::login(&session, &principal).await?;
            Ok(Redirect::to(next.local().unwrap_or(HOME)).into_response())
        }
        Err(AppError::InvalidCredentials) => {
            Ok(rejected(&FieldErrors::single("__all__", INVALID_LOGIN)))
        }
        Err(other) => Err(other.into()),
    }
}

pub async fn logout(session: Session) -> PageResult {
    auth::logout(&session).await?;
    Ok(Redirect::to("/login/").into_response())
}

pub async fn register_form(session: Session) -> PageResult {
    if current_principal(&session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }
    Ok(Html(render::register_page("", &FieldErrors::new())).into_response())
}

pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterRequest>,
) -> PageResult {
    if current_principal(&session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }

    let username = form.username.clone().unwrap_or_default();
    match auth::register(state.users.as_ref(), form).await {
        Ok(user) => {
            auth::login(&session, &Principal::from(&user)).await?;
            Ok(Redirect::to(HOME).into_response())
        }
        Err(AppError::Validation(errors)) => Ok(html_with_status(
            StatusCode::BAD_REQUEST,
            render::register_page(&username, &errors),
        )),
        Err(other) => Err(other.into()),
    }
}
