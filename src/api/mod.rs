// API module - HTTP endpoints

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod middleware;
pub mod reminders;
pub mod staff;

use middleware::session::AppState;

/// Builds the full application router. Shared by `main` and the
/// integration tests, which run it against the in-memory store.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(staff::router())
        .merge(reminders::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
