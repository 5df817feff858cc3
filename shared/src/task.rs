use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::validation::{max_length, required_text, FieldErrors, REQUIRED};

pub type TaskId = Uuid;
pub type UserId = Uuid;

pub const TITLE_MAX_LENGTH: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// `None` only for rows created before tasks were owned; such rows are never listed.
    #[serde(rename = "user")]
    pub owner: Option<UserId>,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(owner: UserId, draft: TaskDraft) -> Self {
        Self::new_at(owner, draft, Utc::now())
    }

    pub fn new_at(owner: UserId, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: Some(owner),
            title: draft.title,
            description: draft.description,
            completed: draft.completed,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == Some(user)
    }

    /// Applies the supplied fields and refreshes `updated_at`.
    pub fn apply(&mut self, changes: TaskChanges, now: DateTime<Utc>) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(completed) = changes.completed {
            self.completed = completed;
        }
        // updated_at never moves behind created_at, even with a skewed clock
        self.updated_at = now.max(self.created_at);
    }
}

/// A validated set of fields for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

/// A validated, possibly partial, set of field replacements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}

impl From<TaskDraft> for TaskChanges {
    fn from(draft: TaskDraft) -> Self {
        Self {
            title: Some(draft.title),
            description: Some(draft.description),
            completed: Some(draft.completed),
        }
    }
}

/// Body of a create request. Read-only fields (`id`, `user`, timestamps) are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl CreateTaskRequest {
    pub fn validate(self) -> Result<TaskDraft, FieldErrors> {
        let mut errors = FieldErrors::new();
        let title = validate_title(&mut errors, self.title);

        match title {
            Some(title) => errors.finish(TaskDraft {
                title,
                description: self.description,
                completed: self.completed.unwrap_or(false),
            }),
            None => Err(errors),
        }
    }
}

/// Whether an update replaces the task (`PUT`) or patches it (`PATCH`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Full,
    Partial,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    /// Absent leaves the description alone; `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl UpdateTaskRequest {
    pub fn validate(self, mode: UpdateMode) -> Result<TaskChanges, FieldErrors> {
        let mut errors = FieldErrors::new();
        let title = match (self.title, mode) {
            (None, UpdateMode::Full) => {
                errors.add("title", REQUIRED);
                None
            }
            (None, UpdateMode::Partial) => None,
            (title, _) => validate_title(&mut errors, title),
        };

        errors.finish(TaskChanges {
            title,
            description: self.description,
            completed: self.completed,
        })
    }
}

fn validate_title(errors: &mut FieldErrors, title: Option<String>) -> Option<String> {
    let title = required_text(errors, "title", title)?;
    max_length(errors, "title", &title, TITLE_MAX_LENGTH).then_some(title)
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
