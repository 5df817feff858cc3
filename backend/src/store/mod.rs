//! Task and user persistence.
//!
//! Every task operation is scoped to an owner. A store distinguishes a task
//! that does not exist ([`StoreError::NotFound`]) from one that belongs to
//! somebody else ([`StoreError::PermissionDenied`]); the presentation layers
//! decide how much of that distinction reaches the client.

pub mod redis;
pub mod sql;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use shared::{Task, TaskChanges, TaskDraft, TaskId, TaskQuery, UserId};
use thiserror::Error;

pub use self::redis::RedisStore;
pub use self::sql::SqlStore;

pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, StoreError>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task {0} belongs to another user")]
    PermissionDenied(TaskId),

    #[error("username {0:?} is already taken")]
    UsernameTaken(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("task {0} kept changing during the update")]
    Contended(TaskId),
}

/// An account as the auth layer sees it. The hash never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

pub trait TaskStore: Send + Sync {
    fn create(&self, owner: UserId, draft: TaskDraft) -> StoreFuture<'_, Task>;

    fn get(&self, id: TaskId, owner: UserId) -> StoreFuture<'_, Task>;

    fn list<'a>(&'a self, query: &'a TaskQuery) -> StoreFuture<'a, Vec<Task>>;

    fn update(&self, id: TaskId, owner: UserId, changes: TaskChanges) -> StoreFuture<'_, Task>;

    fn delete(&self, id: TaskId, owner: UserId) -> StoreFuture<'_, ()>;

    fn count_incomplete(&self, owner: UserId) -> StoreFuture<'_, u64>;
}

pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::UsernameTaken`] when the name is in use.
    fn create_user<'a>(&'a self, username: &'a str, password_hash: &'a str)
        -> StoreFuture<'a, User>;

    fn find_by_username<'a>(&'a self, username: &'a str) -> StoreFuture<'a, Option<User>>;

    fn find_by_id(&self, id: UserId) -> StoreFuture<'_, Option<User>>;
}

/// Resolves a looked-up row against the requesting owner.
pub(crate) fn owned_by(task: Option<Task>, id: TaskId, owner: UserId) -> Result<Task, StoreError> {
    match task {
        Some(task) if task.is_owned_by(owner) => Ok(task),
        Some(_) => Err(StoreError::PermissionDenied(id)),
        None => Err(StoreError::NotFound(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use uuid::Uuid;

    fn task_of(owner: UserId) -> Task {
        Task::new(
            owner,
            TaskDraft {
                title: "Buy milk".to_string(),
                description: None,
                completed: false,
            },
        )
    }

    #[rstest]
    fn test_owned_by_distinguishes_missing_and_foreign() {
        let owner = Uuid::new_v4();
        let task = task_of(owner);
        let id = task.id;

        assert!(owned_by(Some(task.clone()), id, owner).is_ok());
        assert!(matches!(
            owned_by(Some(task), id, Uuid::new_v4()),
            Err(StoreError::PermissionDenied(found)) if found == id
        ));
        assert!(matches!(
            owned_by(None, id, owner),
            Err(StoreError::NotFound(found)) if found == id
        ));
    }
}
