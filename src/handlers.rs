use crate::{
    AppState,
    auth::{self, AuthUser},
    error::AppError,
    models::{
        AdminStatus, ClientSecretResponse, DeleteResult, Document, DocumentBody, EmailFilter,
        Fields, InsertResult, PaymentIntentRequest, PaymentReceipt, Role, UpdateResult,
        UpsertUserResponse, User, sanitize_profile,
    },
    payments::{self, CURRENCY},
    repository::Collection,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::Value;
use uuid::Uuid;

// --- Helpers ---

/// Path ids are generated UUIDs; anything else is a client error, not a missing document.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid id: {raw}")))
}

/// Binds a new document to the caller: a missing `email` is filled from the claim, a present
/// one must match it.
fn claim_ownership(user: &AuthUser, fields: &mut Fields) -> Result<(), AppError> {
    match fields.get("email") {
        None | Some(Value::Null) => {
            fields.insert("email".to_string(), Value::String(user.email.clone()));
            Ok(())
        }
        Some(Value::String(email)) => user.ensure_self(email),
        Some(_) => Err(AppError::BadRequest("email must be a string".to_string())),
    }
}

// --- Public Handlers ---

/// root
///
/// [Public Route] Liveness text.
pub async fn root() -> &'static str {
    "Parts yard server is running"
}

/// upsert_user
///
/// [Public Route] Creates or updates the user keyed by `email` and issues an access token for it.
///
/// *Note*: `email`, `role` and `_id` in the body are ignored; role changes go through the
/// admin route only.
#[utoipa::path(
    put,
    path = "/user/{email}",
    params(("email" = String, Path, description = "User email")),
    request_body = DocumentBody,
    responses((status = 200, description = "Upserted, token issued", body = UpsertUserResponse))
)]
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(DocumentBody(profile)): Json<DocumentBody>,
) -> Result<Json<UpsertUserResponse>, AppError> {
    let result = state
        .repo
        .upsert_user(&email, sanitize_profile(profile))
        .await?;
    let token = auth::issue_token(&email, &state.config.jwt_secret, state.config.token_ttl_hours)?;
    tracing::info!(%email, upserted = result.upserted_id.is_some(), "user upserted");
    Ok(Json(UpsertUserResponse { result, token }))
}

/// check_admin
///
/// [Public Route] Reports whether `email` holds the admin role. Unknown users are not admins.
#[utoipa::path(
    get,
    path = "/admin/{email}",
    params(("email" = String, Path, description = "User email")),
    responses((status = 200, description = "Admin flag", body = AdminStatus))
)]
pub async fn check_admin(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<AdminStatus>, AppError> {
    let admin = state
        .repo
        .get_user(&email)
        .await?
        .is_some_and(|user| user.is_admin());
    Ok(Json(AdminStatus { admin }))
}

#[utoipa::path(
    get,
    path = "/parts",
    responses((status = 200, description = "All parts", body = [DocumentBody]))
)]
pub async fn get_parts(State(state): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.repo.list(Collection::Parts).await?))
}

#[utoipa::path(
    get,
    path = "/parts/{id}",
    params(("id" = Uuid, Path, description = "Part ID")),
    responses(
        (status = 200, description = "Found", body = DocumentBody),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_part(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let id = parse_id(&id)?;
    state
        .repo
        .find(Collection::Parts, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[utoipa::path(
    get,
    path = "/reviews",
    responses((status = 200, description = "All reviews", body = [DocumentBody]))
)]
pub async fn get_reviews(State(state): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.repo.list(Collection::Reviews).await?))
}

// --- Authenticated Handlers ---

/// get_user
///
/// [Authenticated Route] Loads one user record. Self-or-admin.
#[utoipa::path(
    get,
    path = "/user/{email}",
    params(("email" = String, Path, description = "User email")),
    responses(
        (status = 200, description = "User", body = DocumentBody),
        (status = 403, description = "Not the caller and caller not admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<User>, AppError> {
    user.ensure_owner_or_admin(Some(email.as_str()), state.repo.as_ref())
        .await?;
    state
        .repo
        .get_user(&email)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// create_order
///
/// [Authenticated Route] Places an order owned by the caller.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = DocumentBody,
    responses(
        (status = 200, description = "Inserted", body = InsertResult),
        (status = 403, description = "Order email is not the caller's")
    )
)]
pub async fn create_order(
    user: AuthUser,
    State(state): State<AppState>,
    Json(DocumentBody(mut order)): Json<DocumentBody>,
) -> Result<Json<InsertResult>, AppError> {
    claim_ownership(&user, &mut order)?;
    let result = state.repo.insert(Collection::Orders, order).await?;
    tracing::info!(order_id = %result.inserted_id, email = %user.email, "order created");
    Ok(Json(result))
}

/// get_order
///
/// [Authenticated Route] Loads one order, e.g. to render the payment page. Owner-or-admin.
#[utoipa::path(
    get,
    path = "/order/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", body = DocumentBody),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_order(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let id = parse_id(&id)?;
    let order = state
        .repo
        .find(Collection::Orders, id)
        .await?
        .ok_or(AppError::NotFound)?;
    user.ensure_owner_or_admin(order.email(), state.repo.as_ref())
        .await?;
    Ok(Json(order))
}

/// confirm_payment
///
/// [Authenticated Route] Records a completed payment against an order: the order becomes
/// `paid` with the payment's `transactionId`, and the payment document is stored under the
/// order owner's email, whatever the body says. Both writes happen atomically in the
/// repository.
#[utoipa::path(
    patch,
    path = "/order/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = DocumentBody,
    responses(
        (status = 200, description = "Order paid", body = PaymentReceipt),
        (status = 400, description = "Missing transactionId"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn confirm_payment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(DocumentBody(mut payment)): Json<DocumentBody>,
) -> Result<Json<PaymentReceipt>, AppError> {
    let id = parse_id(&id)?;
    let order = state
        .repo
        .find(Collection::Orders, id)
        .await?
        .ok_or(AppError::NotFound)?;
    user.ensure_owner_or_admin(order.email(), state.repo.as_ref())
        .await?;

    let transaction_id = payment
        .get("transactionId")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("transactionId is required".to_string()))?
        .to_string();

    // Payments are listed per owner, so they always carry the order's email.
    match order.email() {
        Some(owner) => {
            payment.insert("email".to_string(), Value::String(owner.to_string()));
        }
        None => {
            payment.remove("email");
        }
    }

    let receipt = state
        .repo
        .record_payment(id, &transaction_id, payment)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(order_id = %id, %transaction_id, "order paid");
    Ok(Json(receipt))
}

/// delete_order
///
/// [Authenticated Route] Cancels an order. Owner-or-admin.
#[utoipa::path(
    delete,
    path = "/order/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResult),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_order(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, AppError> {
    let id = parse_id(&id)?;
    let order = state
        .repo
        .find(Collection::Orders, id)
        .await?
        .ok_or(AppError::NotFound)?;
    user.ensure_owner_or_admin(order.email(), state.repo.as_ref())
        .await?;
    let result = state.repo.delete(Collection::Orders, id).await?;
    tracing::info!(order_id = %id, deleted = result.deleted_count, "order deleted");
    Ok(Json(result))
}

/// filter_orders
///
/// [Authenticated Route] Lists the orders of `?email=`, which must be the caller's.
#[utoipa::path(
    get,
    path = "/orders/filter",
    params(EmailFilter),
    responses(
        (status = 200, description = "Orders of the caller", body = [DocumentBody]),
        (status = 403, description = "Email is not the caller's")
    )
)]
pub async fn filter_orders(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<EmailFilter>,
) -> Result<Json<Vec<Document>>, AppError> {
    user.ensure_self(&filter.email)?;
    Ok(Json(
        state
            .repo
            .find_by_email(Collection::Orders, &filter.email)
            .await?,
    ))
}

/// create_payment_intent
///
/// [Authenticated Route] Opens a card payment intent with the payments provider for the
/// given price and returns its client secret.
#[utoipa::path(
    post,
    path = "/create-payment-intent",
    request_body = PaymentIntentRequest,
    responses(
        (status = 200, description = "Intent created", body = ClientSecretResponse),
        (status = 400, description = "Invalid price"),
        (status = 502, description = "Provider failure")
    )
)]
pub async fn create_payment_intent(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PaymentIntentRequest>,
) -> Result<Json<ClientSecretResponse>, AppError> {
    let amount = payments::amount_in_cents(payload.price)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid price: {}", payload.price)))?;
    let client_secret = state
        .payments
        .create_payment_intent(amount, CURRENCY)
        .await?;
    tracing::info!(email = %user.email, amount, "payment intent created");
    Ok(Json(ClientSecretResponse { client_secret }))
}

/// create_review
///
/// [Authenticated Route] Posts a review signed by the caller.
#[utoipa::path(
    post,
    path = "/reviews",
    request_body = DocumentBody,
    responses((status = 200, description = "Inserted", body = InsertResult))
)]
pub async fn create_review(
    user: AuthUser,
    State(state): State<AppState>,
    Json(DocumentBody(mut review)): Json<DocumentBody>,
) -> Result<Json<InsertResult>, AppError> {
    claim_ownership(&user, &mut review)?;
    let result = state.repo.insert(Collection::Reviews, review).await?;
    tracing::info!(review_id = %result.inserted_id, "review created");
    Ok(Json(result))
}

/// filter_payments
///
/// [Authenticated Route] Lists the payments of `?email=`, which must be the caller's.
#[utoipa::path(
    get,
    path = "/payments/filter",
    params(EmailFilter),
    responses(
        (status = 200, description = "Payments of the caller", body = [DocumentBody]),
        (status = 403, description = "Email is not the caller's")
    )
)]
pub async fn filter_payments(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<EmailFilter>,
) -> Result<Json<Vec<Document>>, AppError> {
    user.ensure_self(&filter.email)?;
    Ok(Json(
        state
            .repo
            .find_by_email(Collection::Payments, &filter.email)
            .await?,
    ))
}

// --- Admin Handlers ---

/// make_admin
///
/// [Admin Route] Grants the admin role to `email`.
///
/// *RBAC*: the caller's stored role is checked before anything is written.
#[utoipa::path(
    put,
    path = "/user/admin/{email}",
    params(("email" = String, Path, description = "Email to promote")),
    responses(
        (status = 200, description = "Updated", body = UpdateResult),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn make_admin(
    user: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<UpdateResult>, AppError> {
    user.ensure_admin(state.repo.as_ref()).await?;
    let result = state.repo.set_role(&email, Role::Admin).await?;
    tracing::info!(
        %email,
        granted_by = %user.email,
        matched = result.matched_count,
        "admin role granted"
    );
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = [DocumentBody]),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn get_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, AppError> {
    user.ensure_admin(state.repo.as_ref()).await?;
    Ok(Json(state.repo.list_users().await?))
}

#[utoipa::path(
    get,
    path = "/orders",
    responses(
        (status = 200, description = "All orders", body = [DocumentBody]),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn get_orders(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, AppError> {
    user.ensure_admin(state.repo.as_ref()).await?;
    Ok(Json(state.repo.list(Collection::Orders).await?))
}

/// create_part
///
/// [Admin Route] Adds a listing to the catalogue.
#[utoipa::path(
    post,
    path = "/parts",
    request_body = DocumentBody,
    responses(
        (status = 200, description = "Inserted", body = InsertResult),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn create_part(
    user: AuthUser,
    State(state): State<AppState>,
    Json(DocumentBody(part)): Json<DocumentBody>,
) -> Result<Json<InsertResult>, AppError> {
    user.ensure_admin(state.repo.as_ref()).await?;
    let result = state.repo.insert(Collection::Parts, part).await?;
    tracing::info!(part_id = %result.inserted_id, "part added");
    Ok(Json(result))
}

/// delete_part
///
/// [Admin Route] Removes a listing. Served on both `/part/{id}` and `/parts/{id}`.
#[utoipa::path(
    delete,
    path = "/part/{id}",
    params(("id" = Uuid, Path, description = "Part ID")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResult),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn delete_part(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, AppError> {
    user.ensure_admin(state.repo.as_ref()).await?;
    let id = parse_id(&id)?;
    let result = state.repo.delete(Collection::Parts, id).await?;
    tracing::info!(part_id = %id, deleted = result.deleted_count, "part deleted");
    Ok(Json(result))
}
