use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{max_length, FieldErrors, REQUIRED};

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const PASSWORD_MIN_LENGTH: usize = 8;

pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";

/// `{"detail": "..."}` status payload used by the auth endpoints and errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    pub detail: String,
}

impl Detail {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = present(&mut errors, "username", self.username);
        let password = present(&mut errors, "password", self.password);

        match (username, password) {
            (Some(username), Some(password)) => Ok(Credentials {
                username: username.trim().to_string(),
                password,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password1: Option<String>,
    #[serde(default)]
    pub password2: Option<String>,
}

impl RegisterRequest {
    /// Checks the username rules and both password fields.
    ///
    /// Password strength is only checked once both fields match, so a
    /// mismatch is reported on its own.
    pub fn validate(self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = present(&mut errors, "username", self.username)
            .map(|username| username.trim().to_string())
            .filter(|username| validate_username(&mut errors, username));
        let password1 = present(&mut errors, "password1", self.password1);
        let password2 = present(&mut errors, "password2", self.password2);

        let password = match (password1, password2) {
            (Some(first), Some(second)) if first != second => {
                errors.add("password2", PASSWORD_MISMATCH);
                None
            }
            (Some(password), Some(_)) => {
                validate_password(&mut errors, &password, username.as_deref());
                Some(password)
            }
            _ => None,
        };

        match (username, password) {
            (Some(username), Some(password)) => errors.finish(Credentials { username, password }),
            _ => Err(errors),
        }
    }
}

fn present(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        Some(value) if !value.is_empty() => Some(value),
        _ => {
            errors.add(field, REQUIRED);
            None
        }
    }
}

fn validate_username(errors: &mut FieldErrors, username: &str) -> bool {
    if username.is_empty() {
        errors.add("username", REQUIRED);
        return false;
    }
    if !max_length(errors, "username", username, USERNAME_MAX_LENGTH) {
        return false;
    }
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if !username.chars().all(allowed) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
        return false;
    }
    true
}

fn validate_password(errors: &mut FieldErrors, password: &str, username: Option<&str>) {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.add(
            "password2",
            format!(
                "This password is too short. It must contain at least {PASSWORD_MIN_LENGTH} characters."
            ),
        );
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        errors.add("password2", "This password is entirely numeric.");
    }
    if username.is_some_and(|username| username.eq_ignore_ascii_case(password)) {
        errors.add("password2", "The password is too similar to the username.");
    }
}
