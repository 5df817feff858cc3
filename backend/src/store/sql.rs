//! Relational store on SQLite through `sqlx`.
//!
//! # Table Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     id BLOB PRIMARY KEY NOT NULL,
//!     username TEXT NOT NULL UNIQUE,
//!     password_hash TEXT NOT NULL,
//!     created_at TEXT NOT NULL
//! );
//!
//! CREATE TABLE tasks (
//!     id BLOB PRIMARY KEY NOT NULL,
//!     user_id BLOB NULL REFERENCES users(id) ON DELETE CASCADE,
//!     title TEXT NOT NULL CHECK (length(title) <= 30),
//!     description TEXT NULL,
//!     completed INTEGER NOT NULL DEFAULT 0,
//!     created_at TEXT NOT NULL,
//!     updated_at TEXT NOT NULL
//! );
//! ```
//!
//! A listing is compiled to a single statement: the owner and search term are
//! bound parameters, the ORDER BY column comes from the allow-listed
//! [`SortField`](shared::SortField) and never from request text.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

use shared::{SortOrder, Task, TaskChanges, TaskDraft, TaskId, TaskQuery, UserId};

use super::{owned_by, StoreError, StoreFuture, TaskStore, User, UserStore};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY NOT NULL,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tasks (
        id BLOB PRIMARY KEY NOT NULL,
        user_id BLOB NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL CHECK (length(title) <= 30),
        description TEXT NULL,
        completed INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_tasks_user_id ON tasks(user_id)",
];

const TASK_COLUMNS: &str = "id, user_id, title, description, completed, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    user_id: Option<Uuid>,
    title: String,
    description: Option<String>,
    completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            owner: row.user_id,
            title: row.title,
            description: row.description,
            completed: row.completed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Opens (creating if needed) the database at `url` and ensures the schema exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Each connection to an in-memory database is a separate database.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("Task schema is up to date");
        Ok(())
    }

    async fn find_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let row: Option<TaskRow> =
            sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Task::from))
    }
}

/// Builds the SELECT for a listing. Placeholders: owner, then the search term if any.
fn list_statement(query: &TaskQuery) -> String {
    let direction = match query.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    let search = if query.search.is_some() {
        " AND instr(lower(title), lower(?)) > 0"
    } else {
        ""
    };
    format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?{search} \
         ORDER BY completed ASC, {column} {direction}, id ASC",
        column = query.sort.as_str(),
    )
}

impl TaskStore for SqlStore {
    fn create(&self, owner: UserId, draft: TaskDraft) -> StoreFuture<'_, Task> {
        Box::pin(async move {
            let task = Task::new(owner, draft);
            sqlx::query(&format!(
                "INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
            ))
            .bind(task.id)
            .bind(task.owner)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.completed)
            .bind(task.created_at)
            .bind(task.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(task)
        })
    }

    fn get(&self, id: TaskId, owner: UserId) -> StoreFuture<'_, Task> {
        Box::pin(async move { owned_by(self.find_task(id).await?, id, owner) })
    }

    fn list<'a>(&'a self, query: &'a TaskQuery) -> StoreFuture<'a, Vec<Task>> {
        Box::pin(async move {
            let statement = list_statement(query);
            let mut select = sqlx::query_as::<_, TaskRow>(&statement).bind(query.owner);
            if let Some(term) = &query.search {
                select = select.bind(term.as_str());
            }
            let rows = select.fetch_all(&self.pool).await?;
            Ok(rows.into_iter().map(Task::from).collect())
        })
    }

    fn update(&self, id: TaskId, owner: UserId, changes: TaskChanges) -> StoreFuture<'_, Task> {
        Box::pin(async move {
            let mut transaction = self.pool.begin().await?;

            let row: Option<TaskRow> =
                sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
                    .bind(id)
                    .fetch_optional(&mut *transaction)
                    .await?;
            let mut task = owned_by(row.map(Task::from), id, owner)?;
            task.apply(changes, Utc::now());

            sqlx::query(
                "UPDATE tasks SET title = ?, description = ?, completed = ?, updated_at = ? \
                 WHERE id = ? AND user_id = ?",
            )
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.completed)
            .bind(task.updated_at)
            .bind(id)
            .bind(owner)
            .execute(&mut *transaction)
            .await?;

            transaction.commit().await?;
            Ok(task)
        })
    }

    fn delete(&self, id: TaskId, owner: UserId) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(owner)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() > 0 {
                return Ok(());
            }
            owned_by(self.find_task(id).await?, id, owner).map(|_| ())
        })
    }

    fn count_incomplete(&self, owner: UserId) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE user_id = ? AND completed = 0")
                    .bind(owner)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
    }
}

impl UserStore for SqlStore {
    fn create_user<'a>(
        &'a self,
        username: &'a str,
        password_hash: &'a str,
    ) -> StoreFuture<'a, User> {
        Box::pin(async move {
            let user = User {
                id: Uuid::new_v4(),
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                created_at: Utc::now(),
            };
            let inserted = sqlx::query(
                "INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .execute(&self.pool)
            .await;

            match inserted {
                Ok(_) => Ok(user),
                Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                    Err(StoreError::UsernameTaken(user.username))
                }
                Err(error) => Err(error.into()),
            }
        })
    }

    fn find_by_username<'a>(&'a self, username: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move {
            let row: Option<UserRow> = sqlx::query_as(
                "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
            )
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(User::from))
        })
    }

    fn find_by_id(&self, id: UserId) -> StoreFuture<'_, Option<User>> {
        Box::pin(async move {
            let row: Option<UserRow> = sqlx::query_as(
                "SELECT id, username, password_hash, created_at FROM users WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(User::from))
        })
    }
}
