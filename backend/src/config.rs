//! Runtime configuration from environment variables.
//!
//! # Environment Variables
//!
//! - `HOST`: Server host address (default: `0.0.0.0`)
//! - `PORT`: Server port (default: `3000`)
//! - `STORAGE_MODE`: `sqlite` (default) | `redis`
//! - `DATABASE_URL`: SQLite URL (default: `sqlite://todolist.db?mode=rwc`)
//! - `REDIS_URL`: Redis connection URL (required when `STORAGE_MODE=redis`)
//! - `SESSION_SECURE_COOKIE`: mark the session cookie `Secure` (default: `false`)
//! - `SESSION_TTL_MINUTES`: session inactivity expiry (default: `1440`)
//! - `LOG_FORMAT`: `text` (default) | `json`
//! - `RUST_LOG`: Logging filter (default: `backend=debug,todolist=debug,tower_http=debug`)

use std::env;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://todolist.db?mode=rwc";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid STORAGE_MODE: {0} (expected sqlite or redis)")]
    InvalidStorageMode(String),

    #[error("REDIS_URL is required when STORAGE_MODE=redis")]
    MissingRedisUrl,

    #[error("invalid LOG_FORMAT: {0} (expected text or json)")]
    InvalidLogFormat(String),

    #[error("invalid {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    #[default]
    Sqlite,
    Redis,
}

impl FromStr for StorageMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "sqlite" | "sql" => Ok(Self::Sqlite),
            "redis" => Ok(Self::Redis),
            _ => Err(ConfigError::InvalidStorageMode(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidLogFormat(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub database_url: String,
    pub redis_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Sqlite,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub secure_cookie: bool,
    pub ttl_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secure_cookie: false,
            ttl_minutes: 24 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub log_format: LogFormat,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable holds an unusable value or
    /// `REDIS_URL` is missing in redis mode.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port: u16 = match get("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value,
            })?,
            None => 3000,
        };

        let storage = StorageConfig {
            mode: get("STORAGE_MODE")
                .map(|value| value.parse::<StorageMode>())
                .transpose()?
                .unwrap_or_default(),
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            redis_url: get("REDIS_URL"),
        };
        if storage.mode == StorageMode::Redis && storage.redis_url.is_none() {
            return Err(ConfigError::MissingRedisUrl);
        }

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            secure_cookie: match get("SESSION_SECURE_COOKIE") {
                Some(value) => parse_bool("SESSION_SECURE_COOKIE", value)?,
                None => defaults.secure_cookie,
            },
            ttl_minutes: match get("SESSION_TTL_MINUTES") {
                Some(value) => match value.parse::<i64>() {
                    Ok(minutes) if minutes > 0 => minutes,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: "SESSION_TTL_MINUTES",
                            value,
                        })
                    }
                },
                None => defaults.ttl_minutes,
            },
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            storage,
            session,
            log_format: get("LOG_FORMAT")
                .map(|value| value.parse::<LogFormat>())
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value }),
    }
}
