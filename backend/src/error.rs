//! Request-level errors and their JSON rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::{Detail, FieldErrors};
use thiserror::Error;

use crate::store::StoreError;

pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] FieldErrors),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("authentication required")]
    NotAuthenticated,

    #[error("already authenticated")]
    AlreadyAuthenticated,

    #[error("permission denied")]
    PermissionDenied,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(StoreError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AppError::AlreadyAuthenticated | AppError::PermissionDenied => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Session(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message for everything but validation errors.
    pub fn detail(&self) -> String {
        match self {
            AppError::Validation(errors) => errors.to_string(),
            AppError::MalformedBody(reason) => reason.clone(),
            AppError::InvalidCredentials => "Invalid credentials".to_string(),
            AppError::NotAuthenticated => {
                "Authentication credentials were not provided.".to_string()
            }
            AppError::AlreadyAuthenticated => "You are already logged in.".to_string(),
            AppError::PermissionDenied => {
                "You do not have permission to perform this action.".to_string()
            }
            AppError::NotFound => "Not found.".to_string(),
            AppError::Store(_) | AppError::Session(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Reports another owner's task as missing, for reads that must not leak existence.
    pub fn conceal_ownership(self) -> Self {
        match self {
            AppError::PermissionDenied => AppError::NotFound,
            other => other,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(_) => AppError::NotFound,
            StoreError::PermissionDenied(_) => AppError::PermissionDenied,
            StoreError::UsernameTaken(_) => {
                AppError::Validation(FieldErrors::single("username", USERNAME_TAKEN))
            }
            other => AppError::Store(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        match self {
            AppError::Validation(errors) => (status, Json(errors)).into_response(),
            other => (status, Json(Detail::new(other.detail()))).into_response(),
        }
    }
}
