use std::sync::Arc;

use crate::config::{StorageConfig, StorageMode};
use crate::store::{RedisStore, SqlStore, StoreError, TaskStore, UserStore};

/// Shared dependencies of every handler.
#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<dyn TaskStore>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    pub fn new(tasks: Arc<dyn TaskStore>, users: Arc<dyn UserStore>) -> Self {
        Self { tasks, users }
    }

    /// One backend serving both tasks and users.
    pub fn with_store<S>(store: S) -> Self
    where
        S: TaskStore + UserStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            tasks: store.clone(),
            users: store,
        }
    }

    /// Opens the backend selected by `STORAGE_MODE`.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        match config.mode {
            StorageMode::Sqlite => {
                tracing::info!(url = %config.database_url, "Using SQLite task store");
                Ok(Self::with_store(SqlStore::connect(&config.database_url).await?))
            }
            StorageMode::Redis => {
                let url = config.redis_url.as_deref().unwrap_or("redis://127.0.0.1:6379");
                tracing::info!("Using Redis task store");
                Ok(Self::with_store(RedisStore::open(url)?))
            }
        }
    }
}
