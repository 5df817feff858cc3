//! Shared helpers for the HTTP integration tests.
//!
//! Every test gets its own application over an in-memory SQLite store and
//! drives it through `tower::ServiceExt::oneshot`. Sessions are carried by
//! copying the `id` cookie from `set-cookie` into later requests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::ServiceExt;

use backend::config::SessionConfig;
use backend::store::SqlStore;
use backend::{router, AppState};

pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("response body is not the expected JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("response body is not UTF-8")
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    /// `name=value` of the session cookie set by this response, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.starts_with("id="))
            .and_then(|value| value.split(';').next())
            .map(str::to_string)
    }
}

pub async fn spawn_app() -> TestApp {
    let store = SqlStore::in_memory()
        .await
        .expect("in-memory store should open");
    let state = AppState::with_store(store);
    TestApp {
        router: router(state.clone(), &SessionConfig::default()),
        state,
    }
}

fn builder(method: Method, uri: &str, cookie: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match cookie {
        Some(cookie) => builder.header(header::COOKIE, cookie),
        None => builder,
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    builder(Method::GET, uri, cookie)
        .body(Body::empty())
        .unwrap()
}

pub fn empty(method: Method, uri: &str, cookie: Option<&str>) -> Request<Body> {
    builder(method, uri, cookie).body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    builder(method, uri, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn form_request(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    builder(Method::POST, uri, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn register(&self, username: &str) -> TestResponse {
        self.send(json_request(
            Method::POST,
            "/api/register/",
            None,
            json!({ "username": username, "password1": PASSWORD, "password2": PASSWORD }),
        ))
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.send(json_request(
            Method::POST,
            "/api/login/",
            None,
            json!({ "username": username, "password": password }),
        ))
        .await
    }

    /// Registers `username` and returns a logged-in session cookie.
    pub async fn register_and_login(&self, username: &str) -> String {
        let registered = self.register(username).await;
        assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.text());

        let logged_in = self.login(username, PASSWORD).await;
        assert_eq!(logged_in.status, StatusCode::OK, "{}", logged_in.text());
        logged_in
            .session_cookie()
            .expect("login should set the session cookie")
    }

    /// Creates a task through the API and returns its JSON.
    pub async fn create_task(&self, cookie: &str, body: Value) -> Value {
        let response = self
            .send(json_request(
                Method::POST,
                "/api/tasks/create/",
                Some(cookie),
                body,
            ))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()
    }

    pub async fn list_titles(&self, cookie: &str, query: &str) -> Vec<String> {
        let response = self
            .send(get(&format!("/api/tasks/{query}"), Some(cookie)))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        response
            .json::<Vec<Value>>()
            .iter()
            .map(|task| task["title"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}
