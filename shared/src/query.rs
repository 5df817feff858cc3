//! Search, sort and order handling for task listings.
//!
//! Both presentation surfaces accept the same request parameters
//! (`search-area`, `sort`, `order`) and turn them into a [`TaskQuery`]. A store
//! either compiles the query to SQL or runs [`TaskQuery::apply`] over the
//! owner's tasks; both must produce the same order:
//!
//! 1. incomplete tasks before completed ones, always;
//! 2. the requested [`SortField`] in the requested [`SortOrder`];
//! 3. `id` ascending, so equal keys still come out in a stable order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::{Task, UserId};

pub const SEARCH_PARAM: &str = "search-area";

/// Fields a listing may be ordered by. Anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Title,
    Description,
    Completed,
    CreatedAt,
    #[default]
    UpdatedAt,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        SortField::Title,
        SortField::Description,
        SortField::Completed,
        SortField::CreatedAt,
        SortField::UpdatedAt,
    ];

    /// Parameter value, which is also the column name in the task table.
    pub const fn as_str(self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Description => "description",
            SortField::Completed => "completed",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            SortField::Title => "Title",
            SortField::Description => "Description",
            SortField::Completed => "Status",
            SortField::CreatedAt => "Created",
            SortField::UpdatedAt => "Last updated",
        }
    }

    fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortField::Title => a.title.cmp(&b.title),
            SortField::Description => a.description.cmp(&b.description),
            SortField::Completed => a.completed.cmp(&b.completed),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
    }
}

impl FromStr for SortField {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| UnknownValue(value.to_string()))
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub const fn reversed(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value {0:?}")]
pub struct UnknownValue(pub String);

/// Which presentation layer a listing is rendered for.
///
/// The pages list oldest-updated first by default, the API newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Html,
    Api,
}

impl Surface {
    pub const fn default_order(self) -> SortOrder {
        match self {
            Surface::Html => SortOrder::Asc,
            Surface::Api => SortOrder::Desc,
        }
    }
}

/// Raw listing parameters as they arrive in a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(rename = "search-area", default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

impl ListParams {
    /// The trimmed search term, or `None` when it is empty.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn sort_field(&self) -> SortField {
        self.sort
            .as_deref()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn sort_order(&self, surface: Surface) -> SortOrder {
        self.order
            .as_deref()
            .and_then(|value| value.parse().ok())
            .unwrap_or(surface.default_order())
    }

    pub fn to_query(&self, owner: UserId, surface: Surface) -> TaskQuery {
        TaskQuery {
            owner,
            search: self.search_term().map(str::to_string),
            sort: self.sort_field(),
            order: self.sort_order(surface),
        }
    }

    /// `order=..&sort=..` carried forward to the list after a mutation.
    pub fn redirect_query(&self, surface: Surface) -> String {
        format!(
            "order={}&sort={}",
            self.sort_order(surface),
            self.sort_field()
        )
    }
}

/// A listing restricted to one owner's tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub owner: UserId,
    pub search: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
}

impl TaskQuery {
    /// Every task of `owner`, most recently updated first.
    pub fn for_owner(owner: UserId) -> Self {
        Self {
            owner,
            search: None,
            sort: SortField::UpdatedAt,
            order: SortOrder::Desc,
        }
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = (!term.trim().is_empty()).then(|| term.trim().to_string());
        self
    }

    pub fn sort_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = field;
        self.order = order;
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !task.is_owned_by(self.owner) {
            return false;
        }
        match &self.search {
            Some(term) => task.title.to_lowercase().contains(&term.to_lowercase()),
            None => true,
        }
    }

    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let requested = match self.order {
            SortOrder::Asc => self.sort.compare(a, b),
            SortOrder::Desc => self.sort.compare(b, a),
        };
        a.completed
            .cmp(&b.completed)
            .then(requested)
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Filters and orders tasks in memory.
    pub fn apply(&self, tasks: impl IntoIterator<Item = Task>) -> Vec<Task> {
        let mut selected: Vec<Task> = tasks.into_iter().filter(|task| self.matches(task)).collect();
        selected.sort_by(|a, b| self.compare(a, b));
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDraft;
    use chrono::{Duration, Utc};
    use rstest::rstest;
    use uuid::Uuid;

    fn task(owner: UserId, title: &str, completed: bool, age_minutes: i64) -> Task {
        let now = Utc::now() - Duration::minutes(age_minutes);
        Task::new_at(
            owner,
            TaskDraft {
                title: title.to_string(),
                description: None,
                completed,
            },
            now,
        )
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.title.as_str()).collect()
    }

    #[rstest]
    fn test_unknown_sort_value_is_reported() {
        let error = "owner".parse::<SortField>().unwrap_err();
        assert_eq!(error.to_string(), r#"unknown value "owner""#);
    }

    #[rstest]
    #[case(Some("title"), SortField::Title)]
    #[case(Some("created_at"), SortField::CreatedAt)]
    #[case(Some("user__password"), SortField::UpdatedAt)]
    #[case(Some("-title"), SortField::UpdatedAt)]
    #[case(None, SortField::UpdatedAt)]
    fn test_sort_field_is_allow_listed(#[case] sort: Option<&str>, #[case] expected: SortField) {
        let params = ListParams {
            sort: sort.map(str::to_string),
            ..ListParams::default()
        };
        assert_eq!(params.sort_field(), expected);
    }

    #[rstest]
    #[case(None, Surface::Html, SortOrder::Asc)]
    #[case(None, Surface::Api, SortOrder::Desc)]
    #[case(Some("desc"), Surface::Html, SortOrder::Desc)]
    #[case(Some("asc"), Surface::Api, SortOrder::Asc)]
    #[case(Some("sideways"), Surface::Api, SortOrder::Desc)]
    fn test_sort_order_defaults_per_surface(
        #[case] order: Option<&str>,
        #[case] surface: Surface,
        #[case] expected: SortOrder,
    ) {
        let params = ListParams {
            order: order.map(str::to_string),
            ..ListParams::default()
        };
        assert_eq!(params.sort_order(surface), expected);
    }

    #[rstest]
    fn test_blank_search_term_is_ignored() {
        let params = ListParams {
            search: Some("   ".to_string()),
            ..ListParams::default()
        };
        assert_eq!(params.search_term(), None);
        assert_eq!(params.to_query(Uuid::new_v4(), Surface::Html).search, None);
    }

    #[rstest]
    fn test_redirect_query_uses_normalized_values() {
        let params = ListParams {
            search: Some("milk".to_string()),
            sort: Some("bogus".to_string()),
            order: None,
        };
        assert_eq!(params.redirect_query(Surface::Html), "order=asc&sort=updated_at");
    }

    #[rstest]
    fn test_desc_title_order() {
        let owner = Uuid::new_v4();
        let tasks = vec![task(owner, "A", false, 1), task(owner, "B", false, 2)];
        let query = TaskQuery::for_owner(owner).sort_by(SortField::Title, SortOrder::Desc);

        assert_eq!(titles(&query.apply(tasks)), ["B", "A"]);
    }

    #[rstest]
    fn test_incomplete_tasks_come_first_for_every_field(
        #[values(
            SortField::Title,
            SortField::Description,
            SortField::Completed,
            SortField::CreatedAt,
            SortField::UpdatedAt
        )]
        field: SortField,
        #[values(SortOrder::Asc, SortOrder::Desc)] order: SortOrder,
    ) {
        let owner = Uuid::new_v4();
        let tasks = vec![
            task(owner, "done early", true, 30),
            task(owner, "open", false, 20),
            task(owner, "done late", true, 10),
            task(owner, "also open", false, 5),
        ];
        let ordered = TaskQuery::for_owner(owner).sort_by(field, order).apply(tasks);

        let first_completed = ordered.iter().position(|task| task.completed).unwrap();
        assert!(ordered[first_completed..].iter().all(|task| task.completed));
        assert_eq!(first_completed, 2);
    }

    #[rstest]
    fn test_default_order_is_most_recently_updated_first() {
        let owner = Uuid::new_v4();
        let tasks = vec![
            task(owner, "old", false, 30),
            task(owner, "new", false, 1),
            task(owner, "finished", true, 0),
        ];

        let ordered = TaskQuery::for_owner(owner).apply(tasks);
        assert_eq!(titles(&ordered), ["new", "old", "finished"]);
    }

    #[rstest]
    fn test_search_is_case_insensitive_substring() {
        let owner = Uuid::new_v4();
        let tasks = vec![
            task(owner, "Buy MILK", false, 1),
            task(owner, "Walk dog", false, 2),
            task(owner, "milkshake", true, 3),
        ];

        let ordered = TaskQuery::for_owner(owner)
            .search("Milk")
            .sort_by(SortField::Title, SortOrder::Asc)
            .apply(tasks);
        assert_eq!(titles(&ordered), ["Buy MILK", "milkshake"]);
    }

    #[rstest]
    fn test_other_owners_and_unowned_tasks_are_excluded() {
        let owner = Uuid::new_v4();
        let mut orphan = task(owner, "orphan", false, 1);
        orphan.owner = None;
        let tasks = vec![task(owner, "mine", false, 1), task(Uuid::new_v4(), "theirs", false, 1), orphan];

        assert_eq!(titles(&TaskQuery::for_owner(owner).apply(tasks)), ["mine"]);
    }
}
