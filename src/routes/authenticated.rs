use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes for any caller with a valid bearer token. The layer above rejects requests
/// without one (401) or with a bad one (403); owner checks (self-match, owner-or-admin)
/// happen inside each handler against the resource being touched.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /user/{email}
        // The caller's own record (or anyone's, for admins).
        .route("/user/{email}", get(handlers::get_user))
        // POST /orders
        // Places an order; the order's `email` is bound to the caller.
        .route("/orders", post(handlers::create_order))
        // GET /orders/filter?email=
        // Self-match: only the caller's own orders.
        .route("/orders/filter", get(handlers::filter_orders))
        // GET/PATCH/DELETE /order/{id}
        // PATCH records the payment and marks the order paid in one atomic write.
        .route(
            "/order/{id}",
            get(handlers::get_order)
                .patch(handlers::confirm_payment)
                .delete(handlers::delete_order),
        )
        // POST /create-payment-intent
        // Returns the provider's client secret for the given price.
        .route(
            "/create-payment-intent",
            post(handlers::create_payment_intent),
        )
        .route("/reviews", post(handlers::create_review))
        // GET /payments/filter?email=
        // Self-match: only the caller's own payments.
        .route("/payments/filter", get(handlers::filter_payments))
}
