//! Personal task list: session-authenticated HTML pages and a JSON API over
//! one task store.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod pages;
pub mod state;
pub mod store;

pub use app::router;
pub use config::{Config, ConfigError};
pub use error::AppError;
pub use state::AppState;
