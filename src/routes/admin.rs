use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Catalogue management and account oversight. The auth layer above guarantees a valid
/// token; every handler here then performs the admin-match against the caller's *stored*
/// role before touching anything.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PUT /user/admin/{email}
        // Promotes another user. Refused with 403 (and nothing written) for non-admins.
        .route("/user/admin/{email}", put(handlers::make_admin))
        .route("/users", get(handlers::get_users))
        .route("/orders", get(handlers::get_orders))
        .route("/parts", post(handlers::create_part))
        // DELETE /part/{id} and /parts/{id}
        // Both spellings are in use by clients.
        .route("/part/{id}", delete(handlers::delete_part))
        .route("/parts/{id}", delete(handlers::delete_part))
}
