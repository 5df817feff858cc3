use shared::{ListParams, SortField, SortOrder, Surface, Task};

use crate::auth::Principal;
use crate::error::AppError;
use crate::state::AppState;

/// The principal's task list as every page shows it.
#[derive(Debug, Clone)]
pub struct ListContext {
    pub tasks: Vec<Task>,
    /// Incomplete tasks of the principal, regardless of the search filter.
    pub count: u64,
    pub search_input: String,
    pub sort: SortField,
    pub order: SortOrder,
}

impl ListContext {
    pub async fn build(
        state: &AppState,
        principal: &Principal,
        params: &ListParams,
    ) -> Result<Self, AppError> {
        let query = params.to_query(principal.id, Surface::Html);
        tracing::debug!(user_id = %principal.id, ?query, "Building task list context");

        let tasks = state.tasks.list(&query).await?;
        let count = state.tasks.count_incomplete(principal.id).await?;

        Ok(Self {
            tasks,
            count,
            search_input: params.search_term().unwrap_or_default().to_string(),
            sort: query.sort,
            order: query.order,
        })
    }
}

/// Where a successful create, update or delete sends the browser.
pub fn list_location(params: &ListParams) -> String {
    format!("/tasks/?{}", params.redirect_query(Surface::Html))
}
