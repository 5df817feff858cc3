//! Key/value store on Redis.
//!
//! Layout:
//!
//! - `task:{id}`: the task as JSON
//! - `user:{owner}:tasks`: set of the owner's task ids
//! - `user:{id}`: the account as JSON
//! - `username:{name}`: the account id, claimed with `SET NX`
//!
//! Listings load the owner's tasks and order them with [`TaskQuery::apply`],
//! so results match the SQL store exactly.
//!
//! Writes that touch more than one key, or that depend on what was read, run
//! as a MULTI pipeline or a Lua script. `WATCH` is not usable on the shared
//! multiplexed connection.

use std::sync::Arc;

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client, Script};
use chrono::Utc;
use uuid::Uuid;

use shared::{Task, TaskChanges, TaskDraft, TaskId, TaskQuery, UserId};

use super::{owned_by, StoreError, StoreFuture, TaskStore, User, UserStore};

fn task_key(id: TaskId) -> String {
    format!("task:{id}")
}

fn owner_index_key(owner: UserId) -> String {
    format!("user:{owner}:tasks")
}

fn user_key(id: UserId) -> String {
    format!("user:{id}")
}

fn username_key(username: &str) -> String {
    format!("username:{username}")
}

const MAX_UPDATE_ATTEMPTS: usize = 5;

/// Replaces `KEYS[1]` with `ARGV[2]` while it still holds `ARGV[1]`.
/// Returns 1 when replaced, 0 when the key is gone, -1 when it changed.
const COMPARE_AND_SET_SCRIPT: &str = r"
local current = redis.call('GET', KEYS[1])
if not current then
    return 0
end
if current ~= ARGV[1] then
    return -1
end
redis.call('SET', KEYS[1], ARGV[2], 'XX')
return 1
";

/// Claims the username `KEYS[1]` for id `ARGV[1]` and stores the account
/// `ARGV[2]` under `KEYS[2]`. Returns 0 when the name is already claimed.
const CREATE_USER_SCRIPT: &str = r"
if not redis.call('SET', KEYS[1], ARGV[1], 'NX') then
    return 0
end
redis.call('SET', KEYS[2], ARGV[2])
return 1
";

#[derive(Clone)]
pub struct RedisStore {
    client: Arc<Client>,
}

impl RedisStore {
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn load_task(
        conn: &mut MultiplexedConnection,
        id: TaskId,
    ) -> Result<Option<Task>, StoreError> {
        let task_json: Option<String> = conn.get(task_key(id)).await?;
        task_json
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }
}

impl TaskStore for RedisStore {
    fn create(&self, owner: UserId, draft: TaskDraft) -> StoreFuture<'_, Task> {
        Box::pin(async move {
            let task = Task::new(owner, draft);
            let task_json = serde_json::to_string(&task)?;

            let mut conn = self.connection().await?;
            ::redis::pipe()
                .atomic()
                .set(task_key(task.id), task_json)
                .ignore()
                .sadd(owner_index_key(owner), task.id.to_string())
                .ignore()
                .query_async::<_, ()>(&mut conn)
                .await?;
            Ok(task)
        })
    }

    fn get(&self, id: TaskId, owner: UserId) -> StoreFuture<'_, Task> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            owned_by(Self::load_task(&mut conn, id).await?, id, owner)
        })
    }

    fn list<'a>(&'a self, query: &'a TaskQuery) -> StoreFuture<'a, Vec<Task>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let ids: Vec<String> = conn.smembers(owner_index_key(query.owner)).await?;
            if ids.is_empty() {
                return Ok(Vec::new());
            }

            let keys: Vec<String> = ids.iter().map(|id| format!("task:{id}")).collect();
            let values: Vec<Option<String>> = ::redis::cmd("MGET")
                .arg(&keys)
                .query_async(&mut conn)
                .await?;

            let mut tasks = Vec::with_capacity(values.len());
            for task_json in values.into_iter().flatten() {
                tasks.push(serde_json::from_str::<Task>(&task_json)?);
            }
            Ok(query.apply(tasks))
        })
    }

    fn update(&self, id: TaskId, owner: UserId, changes: TaskChanges) -> StoreFuture<'_, Task> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let script = Script::new(COMPARE_AND_SET_SCRIPT);

            for _ in 0..MAX_UPDATE_ATTEMPTS {
                let current: Option<String> = conn.get(task_key(id)).await?;
                let Some(current) = current else {
                    return Err(StoreError::NotFound(id));
                };
                let mut task = owned_by(Some(serde_json::from_str(&current)?), id, owner)?;
                task.apply(changes.clone(), Utc::now());
                let task_json = serde_json::to_string(&task)?;

                let replaced: i64 = script
                    .key(task_key(id))
                    .arg(&current)
                    .arg(&task_json)
                    .invoke_async(&mut conn)
                    .await?;
                match replaced {
                    1 => return Ok(task),
                    0 => return Err(StoreError::NotFound(id)),
                    _ => tracing::debug!(task_id = %id, "Task changed during update, retrying"),
                }
            }
            Err(StoreError::Contended(id))
        })
    }

    fn delete(&self, id: TaskId, owner: UserId) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            owned_by(Self::load_task(&mut conn, id).await?, id, owner)?;
            let (removed,): (u64,) = ::redis::pipe()
                .atomic()
                .del(task_key(id))
                .srem(owner_index_key(owner), id.to_string())
                .ignore()
                .query_async(&mut conn)
                .await?;
            if removed == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
    }

    fn count_incomplete(&self, owner: UserId) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let tasks = self.list(&TaskQuery::for_owner(owner)).await?;
            Ok(tasks.iter().filter(|task| !task.completed).count() as u64)
        })
    }
}

impl UserStore for RedisStore {
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
            let user_json = serde_json::to_string(&user)?;

            let mut conn = self.connection().await?;
            let created: i64 = Script::new(CREATE_USER_SCRIPT)
                .key(username_key(username))
                .key(user_key(user.id))
                .arg(user.id.to_string())
                .arg(&user_json)
                .invoke_async(&mut conn)
                .await?;
            if created == 0 {
                return Err(StoreError::UsernameTaken(user.username));
            }
            Ok(user)
        })
    }

    fn find_by_username<'a>(&'a self, username: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let id: Option<String> = conn.get(username_key(username)).await?;
            let Some(id) = id else {
                return Ok(None);
            };
            let id = Uuid::parse_str(&id)
                .map_err(|error| StoreError::Corrupt(format!("username {username:?}: {error}")))?;
            self.find_by_id(id).await
        })
    }

    fn find_by_id(&self, id: UserId) -> StoreFuture<'_, Option<User>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let user_json: Option<String> = conn.get(user_key(id)).await?;
            user_json
                .map(|json| serde_json::from_str(&json))
                .transpose()
                .map_err(StoreError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqlStore;
    use rstest::rstest;
    use shared::{SortField, SortOrder};

    // The store tests below need a running Redis (`REDIS_URL`, default
    // localhost). Run them with `cargo test -- --ignored`.

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    async fn store_with_users(count: usize) -> (RedisStore, Vec<UserId>) {
        let store = RedisStore::open(&redis_url()).unwrap();
        let mut ids = Vec::new();
        for _ in 0..count {
            let name = format!("user-{}", Uuid::new_v4());
            ids.push(store.create_user(&name, "hash").await.unwrap().id);
        }
        (store, ids)
    }

    fn draft(title: &str, completed: bool) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            description: None,
            completed,
        }
    }

    #[rstest]
    fn test_key_layout() {
        let id = Uuid::nil();
        assert_eq!(task_key(id), "task:00000000-0000-0000-0000-000000000000");
        assert_eq!(
            owner_index_key(id),
            "user:00000000-0000-0000-0000-000000000000:tasks"
        );
        assert_eq!(user_key(id), "user:00000000-0000-0000-0000-000000000000");
        assert_eq!(username_key("alice"), "username:alice");
    }

    #[rstest]
    fn test_open_rejects_invalid_url() {
        assert!(matches!(
            RedisStore::open("not a url"),
            Err(StoreError::Redis(_))
        ));
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires Redis instance"]
    async fn test_create_and_get_is_scoped_to_owner() {
        let (store, users) = store_with_users(2).await;
        let task = store.create(users[0], draft("Buy milk", false)).await.unwrap();

        assert_eq!(store.get(task.id, users[0]).await.unwrap(), task);
        assert!(matches!(
            store.get(task.id, users[1]).await,
            Err(StoreError::PermissionDenied(_))
        ));
        assert!(matches!(
            store.get(Uuid::new_v4(), users[0]).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires Redis instance"]
    async fn test_list_orders_like_sql_store() {
        let (store, users) = store_with_users(2).await;
        let sql = SqlStore::in_memory().await.unwrap();
        let sql_owner = sql.create_user("alice", "hash").await.unwrap().id;

        for (title, completed) in [("b", false), ("A", true), ("c", false), ("a", false)] {
            store.create(users[0], draft(title, completed)).await.unwrap();
            sql.create(sql_owner, draft(title, completed)).await.unwrap();
        }
        store.create(users[1], draft("not mine", false)).await.unwrap();

        for field in [SortField::Title, SortField::Completed] {
            for order in [SortOrder::Asc, SortOrder::Desc] {
                let query = TaskQuery::for_owner(users[0]).sort_by(field, order);
                let titles: Vec<String> = store
                    .list(&query)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|task| task.title)
                    .collect();

                let sql_query = TaskQuery::for_owner(sql_owner).sort_by(field, order);
                let sql_titles: Vec<String> = sql
                    .list(&sql_query)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|task| task.title)
                    .collect();

                if field == SortField::Title {
                    assert_eq!(titles, sql_titles, "{field} {order}");
                }
                assert_eq!(titles.len(), 4);
                assert_eq!(titles[3], "A", "{field} {order}");
            }
        }
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires Redis instance"]
    async fn test_update_is_scoped_and_keeps_created_at() {
        let (store, users) = store_with_users(2).await;
        let task = store.create(users[0], draft("Buy milk", false)).await.unwrap();

        let changes = TaskChanges {
            completed: Some(true),
            ..TaskChanges::default()
        };
        let updated = store.update(task.id, users[0], changes.clone()).await.unwrap();

        assert!(updated.completed);
        assert_eq!(updated.title, task.title);
        assert_eq!(updated.created_at, task.created_at);
        assert!(updated.updated_at >= task.updated_at);
        assert_eq!(store.get(task.id, users[0]).await.unwrap(), updated);

        assert!(matches!(
            store.update(task.id, users[1], changes).await,
            Err(StoreError::PermissionDenied(_))
        ));
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires Redis instance"]
    async fn test_concurrent_updates_keep_both_changes() {
        let (store, users) = store_with_users(1).await;
        let task = store.create(users[0], draft("Buy milk", false)).await.unwrap();

        let rename = TaskChanges {
            title: Some("Buy oat milk".to_string()),
            ..TaskChanges::default()
        };
        let finish = TaskChanges {
            completed: Some(true),
            ..TaskChanges::default()
        };
        let (renamed, finished) = tokio::join!(
            store.update(task.id, users[0], rename),
            store.update(task.id, users[0], finish),
        );
        renamed.unwrap();
        finished.unwrap();

        let stored = store.get(task.id, users[0]).await.unwrap();
        assert_eq!(stored.title, "Buy oat milk");
        assert!(stored.completed);
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires Redis instance"]
    async fn test_delete_is_permanent_and_cleans_the_index() {
        let (store, users) = store_with_users(2).await;
        let task = store.create(users[0], draft("Buy milk", false)).await.unwrap();

        assert!(matches!(
            store.delete(task.id, users[1]).await,
            Err(StoreError::PermissionDenied(_))
        ));
        store.delete(task.id, users[0]).await.unwrap();

        let mut conn = store.connection().await.unwrap();
        let indexed: bool = conn
            .sismember(owner_index_key(users[0]), task.id.to_string())
            .await
            .unwrap();
        assert!(!indexed);
        assert!(store
            .list(&TaskQuery::for_owner(users[0]))
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            store.delete(task.id, users[0]).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires Redis instance"]
    async fn test_update_after_delete_does_not_revive_task() {
        let (store, users) = store_with_users(1).await;
        let task = store.create(users[0], draft("Buy milk", false)).await.unwrap();
        store.delete(task.id, users[0]).await.unwrap();

        let changes = TaskChanges {
            completed: Some(true),
            ..TaskChanges::default()
        };
        assert!(matches!(
            store.update(task.id, users[0], changes).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get(task.id, users[0]).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires Redis instance"]
    async fn test_count_incomplete() {
        let (store, users) = store_with_users(1).await;
        store.create(users[0], draft("one", false)).await.unwrap();
        store.create(users[0], draft("two", true)).await.unwrap();
        store.create(users[0], draft("three", false)).await.unwrap();

        assert_eq!(store.count_incomplete(users[0]).await.unwrap(), 2);
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires Redis instance"]
    async fn test_usernames_are_unique() {
        let store = RedisStore::open(&redis_url()).unwrap();
        let name = format!("alice-{}", Uuid::new_v4());
        let user = store.create_user(&name, "hash").await.unwrap();

        assert!(matches!(
            store.create_user(&name, "other").await,
            Err(StoreError::UsernameTaken(taken)) if taken == name
        ));
        let found = store.find_by_username(&name).await.unwrap().unwrap();
        assert_eq!(found, user);
        assert_eq!(store.find_by_id(user.id).await.unwrap(), Some(found));
        assert_eq!(
            store
                .find_by_username(&format!("nobody-{}", Uuid::new_v4()))
                .await
                .unwrap(),
            None
        );
    }
}
