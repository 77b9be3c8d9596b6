use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, AppState};

/// Preflight responses may be cached for 12 hours.
const CORS_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

/// The submit API. CORS is wide open: the editor front-end is served
/// from arbitrary origins during development.
pub fn routes(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(CORS_MAX_AGE);

    Router::new()
        .route("/submit", post(handlers::submit))
        .route("/healthz", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
