pub mod auth;
pub mod query;
pub mod task;
pub mod validation;

pub use auth::{Credentials, Detail, LoginRequest, RegisterRequest, UserProfile};
pub use query::{ListParams, SortField, SortOrder, Surface, TaskQuery, SEARCH_PARAM};
pub use task::{
    CreateTaskRequest, Task, TaskChanges, TaskDraft, TaskId, UpdateMode, UpdateTaskRequest,
    UserId, TITLE_MAX_LENGTH,
};
pub use validation::FieldErrors;
