//! Session principal, credentials and the auth extractors.
//!
//! A successful login stores a [`Principal`] in the `tower-sessions` session.
//! Handlers receive it explicitly through [`CurrentUser`] (API) or
//! `pages::PageUser` (HTML); nothing reads the session behind their back.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use shared::{Credentials, RegisterRequest, UserId, UserProfile};
use tokio::sync::OnceCell;
use tower_sessions::Session;

use crate::error::{AppError, USERNAME_TAKEN};
use crate::store::{User, UserStore};

pub const PRINCIPAL_KEY: &str = "principal";

/// Checked against when the username is unknown, so both rejections cost one
/// argon2 verification.
static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

/// The authenticated user of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

impl From<Principal> for UserProfile {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.id,
            username: principal.username,
        }
    }
}

pub async fn current_principal(session: &Session) -> Result<Option<Principal>, AppError> {
    Ok(session.get::<Principal>(PRINCIPAL_KEY).await?)
}

/// Binds `principal` to the session under a fresh session id.
pub async fn login(session: &Session, principal: &Principal) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(PRINCIPAL_KEY, principal).await?;
    tracing::info!(user_id = %principal.id, username = %principal.username, "User logged in");
    Ok(())
}

pub async fn logout(session: &Session) -> Result<(), AppError> {
    if let Some(principal) = current_principal(session).await? {
        tracing::info!(user_id = %principal.id, "User logged out");
    }
    session.flush().await?;
    Ok(())
}

/// Checks a username/password pair against the user store.
pub async fn authenticate(
    users: &dyn UserStore,
    credentials: Credentials,
) -> Result<Principal, AppError> {
    let Some(user) = users.find_by_username(&credentials.username).await? else {
        let dummy = DUMMY_HASH
            .get_or_try_init(|| hash_password("not a real password".to_string()))
            .await?;
        verify_password(credentials.password, dummy.clone()).await?;
        tracing::warn!(username = %credentials.username, "Login rejected: unknown user");
        return Err(AppError::InvalidCredentials);
    };

    if verify_password(credentials.password, user.password_hash.clone()).await? {
        Ok(Principal::from(&user))
    } else {
        tracing::warn!(username = %credentials.username, "Login rejected: wrong password");
        Err(AppError::InvalidCredentials)
    }
}

/// Validates a registration and creates the account.
pub async fn register(users: &dyn UserStore, request: RegisterRequest) -> Result<User, AppError> {
    let credentials = request.validate()?;

    if users.find_by_username(&credentials.username).await?.is_some() {
        return Err(shared::FieldErrors::single("username", USERNAME_TAKEN).into());
    }

    let password_hash = hash_password(credentials.password).await?;
    let user = users
        .create_user(&credentials.username, &password_hash)
        .await?;
    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok(user)
}

pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|error| AppError::Internal(format!("password hashing failed: {error}")))
    })
    .await
    .map_err(|error| AppError::Internal(format!("password hashing task failed: {error}")))?
}

pub async fn verify_password(password: String, password_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&password_hash)
            .map_err(|error| AppError::Internal(format!("stored hash is unreadable: {error}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|error| AppError::Internal(format!("password check task failed: {error}")))?
}

async fn session_from_parts<S: Send + Sync>(
    parts: &mut Parts,
    state: &S,
) -> Result<Session, AppError> {
    Session::from_request_parts(parts, state)
        .await
        .map_err(|(_, message)| AppError::Internal(message.to_string()))
}

/// Extracts the session principal; rejects anonymous callers with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts, state).await?;
        current_principal(&session)
            .await?
            .map(CurrentUser)
            .ok_or(AppError::NotAuthenticated)
    }
}

/// Only lets anonymous callers through; rejects a logged-in session with 403.
#[derive(Debug, Clone, Copy)]
pub struct Anonymous;

#[async_trait]
impl<S> FromRequestParts<S> for Anonymous
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts, state).await?;
        match current_principal(&session).await? {
            Some(_) => Err(AppError::AlreadyAuthenticated),
            None => Ok(Anonymous),
        }
    }
}
