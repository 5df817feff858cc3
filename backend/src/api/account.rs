use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use shared::{Detail, LoginRequest, RegisterRequest, UserProfile};
use tower_sessions::Session;

use super::json_body;
use crate::auth::{self, Anonymous, Principal};
use crate::error::AppError;
use crate::state::AppState;

/// `POST /api/login/`: `403` when the session is already logged in.
pub async fn login(
    State(state): State<AppState>,
    _: Anonymous,
    session: Session,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Detail>, AppError> {
    let credentials = json_body(payload)?.validate()?;
    let principal = auth::authenticate(state.users.as_ref(), credentials).await?;
    auth::login(&session, &principal).await?;
    Ok(Json(Detail::new("Successfully logged in")))
}

/// `POST /api/logout/` succeeds whether or not anyone was logged in.
pub async fn logout(session: Session) -> Result<Json<Detail>, AppError> {
    auth::logout(&session).await?;
    Ok(Json(Detail::new("Successfully logged out")))
}

/// `POST /api/register/` creates the account without logging it in.
pub async fn register(
    State(state): State<AppState>,
    _: Anonymous,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let user = auth::register(state.users.as_ref(), json_body(payload)?).await?;
    let profile = UserProfile::from(Principal::from(&user));
    Ok((StatusCode::CREATED, Json(profile)))
}
