use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Public Router Module
///
/// Endpoints reachable without a credential. Everything here is either read-only catalogue
/// data or the entry point that issues credentials.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root))
        // GET /health
        // Load balancer probe.
        .route("/health", get(|| async { "ok" }))
        // PUT /user/{email}
        // Upserts the user profile and returns `{ result, token }`. This is how clients
        // obtain a bearer token after signing in with the upstream identity provider.
        .route("/user/{email}", put(handlers::upsert_user))
        // GET /admin/{email}
        // `{ admin: bool }`, used by the frontend to show or hide the dashboard.
        .route("/admin/{email}", get(handlers::check_admin))
        .route("/parts", get(handlers::get_parts))
        .route("/parts/{id}", get(handlers::get_part))
        .route("/reviews", get(handlers::get_reviews))
}
