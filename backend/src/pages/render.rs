//! HTML for the server-rendered pages.
//!
//! Pages are sauron node trees in the Catppuccin Tailwind palette, rendered
//! to strings on the server. Sauron escapes every text node.

use axum::http::StatusCode;
use sauron::{
    html::{attributes::*, *},
    prelude::*,
};
use shared::{FieldErrors, ListParams, SortField, SortOrder, Task, TITLE_MAX_LENGTH};

use super::context::ListContext;
use super::tasks::TaskForm;
use super::with_query;
use crate::auth::Principal;

const INPUT_CLASS: &str = "w-full px-3 py-2 bg-ctp-surface0 border border-ctp-surface2 rounded-md text-ctp-text placeholder-ctp-subtext0 focus:outline-none focus:ring-2 focus:ring-ctp-blue focus:border-transparent";
const PRIMARY_BUTTON: &str = "bg-ctp-blue hover:bg-ctp-sapphire text-ctp-base font-medium px-6 py-2 rounded-md transition-colors duration-200";
const DANGER_BUTTON: &str = "bg-ctp-red/20 text-ctp-red hover:bg-ctp-red/30 px-3 py-1 rounded-full text-sm font-medium transition-colors duration-200";
const SECONDARY_BUTTON: &str = "bg-ctp-overlay0 hover:bg-ctp-overlay1 text-ctp-text font-medium px-4 py-2 rounded-md transition-colors duration-200";
const NAV_LINK: &str = "px-3 py-2 rounded-md text-sm font-medium transition-colors duration-200 text-ctp-subtext0 hover:text-ctp-text hover:bg-ctp-surface0";
const CARD: &str = "bg-ctp-surface0 rounded-lg shadow-lg p-8 border border-ctp-surface1";

/// Wraps `content` in the page chrome and renders the whole document.
fn document(page_title: &str, principal: Option<&Principal>, content: Vec<Node<()>>) -> String {
    let heading: Node<()> = text(format!("{page_title} · To Do List"));
    let page: Node<()> = div(
        [class("min-h-screen bg-ctp-base text-ctp-text")],
        [
            view_header(principal),
            div([class("max-w-6xl mx-auto px-6 py-8 space-y-8")], content),
        ],
    );

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n<title>{}</title>\n</head>\n<body>{}</body>\n</html>\n",
        heading.render_to_string(),
        page.render_to_string(),
    )
}

fn view_header(principal: Option<&Principal>) -> Node<()> {
    let links = match principal {
        Some(principal) => vec![
            span([class("text-ctp-subtext0 text-sm")], [text(&principal.username)]),
            a([href("/tasks/"), class(NAV_LINK)], [text("Tasks")]),
            a([href("/task-create/"), class(NAV_LINK)], [text("New task")]),
            form(
                [attr("method", "post"), attr("action", "/logout/"), class("inline")],
                [button([r#type("submit"), class(NAV_LINK)], [text("Log out")])],
            ),
        ],
        None => vec![
            a([href("/login/"), class(NAV_LINK)], [text("Log in")]),
            a([href("/register/"), class(NAV_LINK)], [text("Register")]),
        ],
    };

    header([class("bg-ctp-mantle shadow-lg border-b border-ctp-surface0")], [
        div([class("max-w-6xl mx-auto px-6 py-4")], [
            div([class("flex items-center justify-between")], [
                h1([class("text-2xl font-bold text-ctp-text")], [text("To Do List")]),
                nav([class("flex items-center space-x-8")], links),
            ]),
        ]),
    ])
}

fn field_errors(errors: &FieldErrors, field: &str) -> Vec<Node<()>> {
    errors
        .get(field)
        .iter()
        .map(|message| p([class("text-ctp-red text-sm mt-1")], [text(message)]))
        .collect()
}

/// A form control followed by the messages recorded for `field`.
fn field_group(mut children: Vec<Node<()>>, errors: &FieldErrors, field: &str) -> Node<()> {
    children.extend(field_errors(errors, field));
    div([], children)
}

fn text_input(field: &str, input_type: &str, hint: &str, current: &str) -> Node<()> {
    input(
        [
            r#type(input_type.to_string()),
            attr("name", field.to_string()),
            placeholder(hint.to_string()),
            value(current.to_string()),
            class(INPUT_CLASS),
        ],
        [],
    )
}

fn status_badge(task: &Task) -> Node<()> {
    if task.completed {
        span([class("inline-flex items-center px-2 py-1 rounded-full text-xs font-medium bg-ctp-green/20 text-ctp-green")], [text("Completed")])
    } else {
        span([class("inline-flex items-center px-2 py-1 rounded-full text-xs font-medium bg-ctp-yellow/20 text-ctp-yellow")], [text("Pending")])
    }
}

fn sort_controls(context: &ListContext) -> Node<()> {
    let options = SortField::ALL.into_iter().map(|field| {
        let mut attrs = vec![value(field.as_str())];
        if field == context.sort {
            attrs.push(attr("selected", "selected"));
        }
        option(attrs, [text(field.label())])
    });

    let toggle = context.order.reversed();
    let toggle_link = with_query(
        "/tasks/",
        &ListParams {
            search: (!context.search_input.is_empty()).then(|| context.search_input.clone()),
            sort: Some(context.sort.as_str().to_string()),
            order: Some(toggle.as_str().to_string()),
        },
    );

    form(
        [
            attr("method", "get"),
            attr("action", "/tasks/"),
            class("flex flex-wrap items-center gap-3"),
        ],
        [
            input(
                [
                    r#type("search"),
                    attr("name", shared::SEARCH_PARAM),
                    value(&context.search_input),
                    placeholder("Search by title"),
                    class(&format!("{INPUT_CLASS} max-w-xs")),
                ],
                [],
            ),
            select(
                [attr("name", "sort"), class(&format!("{INPUT_CLASS} max-w-[12rem]"))],
                options.collect::<Vec<_>>(),
            ),
            input(
                [r#type("hidden"), attr("name", "order"), value(context.order.as_str())],
                [],
            ),
            button([r#type("submit"), class(PRIMARY_BUTTON)], [text("Search")]),
            a([href(&toggle_link), class(SECONDARY_BUTTON)], [text(
                if toggle == SortOrder::Asc {
                    "Ascending"
                } else {
                    "Descending"
                },
            )]),
        ],
    )
}

fn view_task(task: &Task) -> Node<()> {
    li(
        [class(&format!(
            "group border rounded-xl p-6 bg-ctp-surface0 shadow-sm transition-all duration-300 hover:shadow-lg {}",
            if task.completed {
                "border-ctp-green bg-ctp-green/10"
            } else {
                "border-ctp-surface1 hover:border-ctp-blue"
            }
        ))],
        [div([class("flex items-center justify-between gap-4")], [
            a(
                [
                    href(&format!("/task/{}/", task.id)),
                    class(&format!(
                        "text-lg font-medium {}",
                        if task.completed {
                            "line-through text-ctp-overlay1"
                        } else {
                            "text-ctp-text"
                        }
                    )),
                ],
                [text(&task.title)],
            ),
            div([class("flex items-center gap-3")], [
                status_badge(task),
                a(
                    [
                        href(&format!("/task-update/{}/", task.id)),
                        class("text-ctp-blue hover:text-ctp-sapphire text-sm"),
                    ],
                    [text("Edit")],
                ),
                a(
                    [href(&format!("/task-delete/{}/", task.id)), class(DANGER_BUTTON)],
                    [text("Delete")],
                ),
            ]),
        ])],
    )
}

/// Search box, sort controls, incomplete count and the task cards.
pub fn task_list(context: &ListContext) -> Node<()> {
    let noun = if context.count == 1 { "task" } else { "tasks" };

    div([class(&format!("{CARD} space-y-6"))], [
        div([class("flex items-center justify-between")], [
            h2([class("text-2xl font-bold text-ctp-text")], [text("Your tasks")]),
            span(
                [class("bg-ctp-blue/20 text-ctp-blue px-2 py-1 rounded-full text-sm font-medium")],
                [text(format!("{} incomplete {noun}", context.count))],
            ),
        ]),
        sort_controls(context),
        if context.tasks.is_empty() {
            div([class("text-center py-10 text-ctp-subtext0 italic")], [text("No tasks found.")])
        } else {
            ul(
                [class("space-y-4")],
                context.tasks.iter().map(view_task).collect::<Vec<_>>(),
            )
        },
    ])
}

pub fn list_page(principal: &Principal, context: &ListContext) -> String {
    document("Tasks", Some(principal), vec![task_list(context)])
}

pub fn detail_page(principal: &Principal, task: &Task) -> String {
    let description = match task.description.as_deref() {
        Some(description) if !description.is_empty() => text(description),
        _ => span([class("italic text-ctp-subtext0")], [text("No description")]),
    };
    let detail_row = |name: &str, shown: String| -> Node<()> {
        div([], [
            span([class("text-ctp-subtext0")], [text(name)]),
            text(" "),
            span([], [text(shown)]),
        ])
    };

    let content = div([class(&format!("{CARD} space-y-4"))], [
        div([class("flex items-center justify-between")], [
            h2([class("text-3xl font-bold text-ctp-text")], [text(&task.title)]),
            status_badge(task),
        ]),
        p([class("text-ctp-subtext1 whitespace-pre-line")], [description]),
        div(
            [class("bg-ctp-surface1 rounded-lg p-4 space-y-2 font-mono text-sm border border-ctp-surface2")],
            [
                detail_row("Owner:", principal.username.clone()),
                detail_row("Created:", task.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                detail_row("Updated:", task.updated_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            ],
        ),
        div([class("flex gap-3")], [
            a([href(&format!("/task-update/{}/", task.id)), class(PRIMARY_BUTTON)], [text("Edit")]),
            a([href(&format!("/task-delete/{}/", task.id)), class(DANGER_BUTTON)], [text("Delete")]),
            a([href("/tasks/"), class(SECONDARY_BUTTON)], [text("Back to list")]),
        ]),
    ]);
    document(&task.title, Some(principal), vec![content])
}

/// Create and update share one form; `target` carries the list parameters along.
pub fn task_form_page(
    principal: &Principal,
    heading: &str,
    target: &str,
    values: &TaskForm,
    errors: &FieldErrors,
    context: &ListContext,
) -> String {
    let mut checkbox = vec![r#type("checkbox"), attr("name", "completed"), value("on")];
    if values.is_completed() {
        checkbox.push(checked(true));
    }

    let content = div(
        [class("mb-8 p-6 bg-ctp-surface1 rounded-lg border border-ctp-surface2")],
        [
            h2(
                [class("text-xl font-semibold text-ctp-text mb-4 pb-2 border-b border-ctp-surface2")],
                [text(heading)],
            ),
            form(
                [attr("method", "post"), attr("action", target.to_string()), class("space-y-4")],
                [
                    field_group(
                        vec![
                            label(
                                [attr("for", "title"), class("block text-sm text-ctp-subtext1 mb-1")],
                                [text("Title")],
                            ),
                            input(
                                [
                                    r#type("text"),
                                    id("title"),
                                    attr("name", "title"),
                                    attr("maxlength", TITLE_MAX_LENGTH.to_string()),
                                    value(values.title.as_deref().unwrap_or_default().to_string()),
                                    class(INPUT_CLASS),
                                ],
                                [],
                            ),
                        ],
                        errors,
                        "title",
                    ),
                    field_group(
                        vec![
                            label(
                                [attr("for", "description"), class("block text-sm text-ctp-subtext1 mb-1")],
                                [text("Description")],
                            ),
                            textarea(
                                [
                                    id("description"),
                                    attr("name", "description"),
                                    class(&format!("{INPUT_CLASS} h-20 resize-y")),
                                ],
                                [text(values.description.as_deref().unwrap_or_default())],
                            ),
                        ],
                        errors,
                        "description",
                    ),
                    label([class("flex items-center gap-2 text-ctp-subtext1")], [
                        input(checkbox, []),
                        text("Completed"),
                    ]),
                    button([r#type("submit"), class(PRIMARY_BUTTON)], [text("Save")]),
                ],
            ),
        ],
    );
    document(heading, Some(principal), vec![content, task_list(context)])
}

pub fn delete_page(principal: &Principal, task: &Task, target: &str, context: &ListContext) -> String {
    let content = div([class(&format!("{CARD} space-y-4"))], [
        h2([class("text-2xl font-semibold text-ctp-text")], [text("Delete task")]),
        p(
            [class("text-ctp-subtext1")],
            [text(format!("Are you sure you want to delete \"{}\"?", task.title))],
        ),
        form(
            [attr("method", "post"), attr("action", target.to_string()), class("flex gap-3")],
            [
                button([r#type("submit"), class(DANGER_BUTTON)], [text("Delete")]),
                a([href("/tasks/"), class(SECONDARY_BUTTON)], [text("Cancel")]),
            ],
        ),
    ]);
    document("Delete task", Some(principal), vec![content, task_list(context)])
}

pub fn login_page(username: &str, next: Option<&str>, errors: &FieldErrors) -> String {
    let target = match next {
        Some(next) => with_query("/login/", &[("next", next)]),
        None => "/login/".to_string(),
    };

    let mut children = field_errors(errors, "__all__");
    children.push(form(
        [attr("method", "post"), attr("action", target), class("space-y-4")],
        [
            field_group(vec![text_input("username", "text", "Username", username)], errors, "username"),
            field_group(vec![text_input("password", "password", "Password", "")], errors, "password"),
            button([r#type("submit"), class(PRIMARY_BUTTON)], [text("Log in")]),
        ],
    ));
    children.push(p([class("text-ctp-subtext0 text-sm")], [
        text("No account yet? "),
        a([href("/register/"), class("text-ctp-blue")], [text("Register")]),
    ]));

    children.insert(0, h2([class("text-2xl font-bold text-ctp-text")], [text("Log in")]));

    let content = div([class(&format!("{CARD} max-w-md mx-auto space-y-4"))], children);
    document("Log in", None, vec![content])
}

pub fn register_page(username: &str, errors: &FieldErrors) -> String {
    let content = div([class(&format!("{CARD} max-w-md mx-auto space-y-4"))], [
        h2([class("text-2xl font-bold text-ctp-text")], [text("Register")]),
        form(
            [attr("method", "post"), attr("action", "/register/"), class("space-y-4")],
            [
                field_group(vec![text_input("username", "text", "Username", username)], errors, "username"),
                field_group(vec![text_input("password1", "password", "Password", "")], errors, "password1"),
                field_group(
                    vec![text_input("password2", "password", "Password confirmation", "")],
                    errors,
                    "password2",
                ),
                button([r#type("submit"), class(PRIMARY_BUTTON)], [text("Register")]),
            ],
        ),
        p([class("text-ctp-subtext0 text-sm")], [
            text("Already registered? "),
            a([href("/login/"), class("text-ctp-blue")], [text("Log in")]),
        ]),
    ]);
    document("Register", None, vec![content])
}

pub fn error_page(status: StatusCode, detail: &str) -> String {
    let content = div(
        [class("bg-ctp-surface1 rounded-lg p-6 text-center border border-ctp-surface2 space-y-4")],
        [
            h2([class("text-3xl font-bold text-ctp-text")], [text(status.as_u16().to_string())]),
            p([class("text-ctp-subtext1")], [text(detail)]),
            a(
                [href("/tasks/"), class(&format!("{PRIMARY_BUTTON} inline-block"))],
                [text("Back to your tasks")],
            ),
        ],
    );
    document(status.canonical_reason().unwrap_or("Error"), None, vec![content])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use shared::TaskDraft;
    use uuid::Uuid;

    fn principal() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
        }
    }

    #[rstest]
    fn test_detail_page_shows_owner_and_timestamps() {
        let principal = principal();
        let created = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let task = Task::new_at(
            principal.id,
            TaskDraft {
                title: "<b>Buy milk</b>".to_string(),
                description: Some("2%".to_string()),
                completed: false,
            },
            created,
        );

        let html = detail_page(&principal, &task);

        assert!(html.contains("&lt;b&gt;Buy milk&lt;/b&gt;"));
        assert!(!html.contains("<b>Buy milk</b>"));
        assert!(html.contains("2024-03-09 14:05:07"));
        assert!(html.contains("alice"));
    }

    #[rstest]
    fn test_task_list_shows_count_and_selected_sort() {
        let context = ListContext {
            tasks: Vec::new(),
            count: 1,
            search_input: "milk".to_string(),
            sort: SortField::Title,
            order: SortOrder::Asc,
        };

        let html = task_list(&context).render_to_string();

        assert!(html.contains("1 incomplete task<"));
        assert!(html.contains(r#"selected="selected""#));
        assert!(html.contains(r#"value="milk""#));
        assert!(html.contains("search-area=milk&"));
        assert!(html.contains("No tasks found."));
    }

    #[rstest]
    fn test_login_page_encodes_next_into_action() {
        let html = login_page("alice", Some("/tasks/?sort=title"), &FieldErrors::new());

        assert!(html.contains("/login/?next=%2Ftasks%2F%3Fsort%3Dtitle"));
        assert!(html.contains(r#"value="alice""#));
    }
}
