use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

use crate::config::SessionConfig;
use crate::state::AppState;
use crate::{api, pages};

/// The full application: pages at the root, the JSON API under `/api`.
pub fn router(state: AppState, session: &SessionConfig) -> Router {
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(session.secure_cookie)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            session.ttl_minutes,
        )));

    Router::new()
        .route("/health", get(health))
        .merge(pages::routes())
        .nest("/api", api::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(sessions),
        )
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
