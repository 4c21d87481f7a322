use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Fields
///
/// The schemaless body of a stored document: any JSON object the client sends.
pub type Fields = Map<String, Value>;

// --- Stored Documents ---

/// Document
///
/// A record in one of the keyed collections (parts, orders, reviews, payments).
/// The generated key is serialized as `_id` next to the client-supplied fields, so the
/// wire shape is a single flat JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Document {
    /// The owning email, when the document carries one.
    pub fn email(&self) -> Option<&str> {
        self.fields.get("email").and_then(Value::as_str)
    }
}

/// DocumentBody
///
/// OpenAPI stand-in for any free-form JSON object, used for request bodies and for
/// document listings in the generated docs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct DocumentBody(pub Fields);

/// Role
///
/// The RBAC field of a user record. Anything that is not `admin` is a regular account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq, Default)]
#[ts(export)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[default]
    #[serde(rename = "default")]
    Standard,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Standard => "default",
        }
    }

    /// Maps a stored role string; unknown values fall back to `Standard`.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            _ => Role::Standard,
        }
    }
}

/// User
///
/// A user record keyed by email. Profile fields sent on upsert are kept verbatim and
/// flattened into the same object as `email` and `role`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct User {
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(flatten)]
    pub profile: Fields,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Removes keys the client may not control through a profile upsert: the key itself,
/// the role (only the admin route may change it) and any stray document id.
pub fn sanitize_profile(mut profile: Fields) -> Fields {
    for reserved in ["_id", "email", "role"] {
        profile.remove(reserved);
    }
    profile
}

// --- Write Acknowledgements ---

/// InsertResult
///
/// Acknowledgement for a single-document insert.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InsertResult {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

impl InsertResult {
    pub fn new(inserted_id: Uuid) -> Self {
        Self {
            acknowledged: true,
            inserted_id,
        }
    }
}

/// UpdateResult
///
/// Acknowledgement for an update or upsert. `upserted_id` carries the key of a record
/// created by an upsert and is `None` when an existing record matched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<String>,
}

/// DeleteResult
///
/// Acknowledgement for a single-document delete.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteResult {
    pub fn new(deleted_count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count,
        }
    }
}

// --- Request Payloads ---

/// EmailFilter
///
/// Query parameters for the owner-scoped listings (`/orders/filter`, `/payments/filter`).
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct EmailFilter {
    /// Must equal the email of the authenticated caller.
    pub email: String,
}

/// PaymentIntentRequest
///
/// Body of `POST /create-payment-intent`. The client sends the part being bought;
/// only its `price` (in dollars) matters here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PaymentIntentRequest {
    #[schema(example = 49.99)]
    pub price: f64,
}

// --- Responses ---

/// UpsertUserResponse
///
/// Returned by `PUT /user/{email}`: the write acknowledgement and a fresh access token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpsertUserResponse {
    pub result: UpdateResult,
    pub token: String,
}

/// AdminStatus
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct AdminStatus {
    pub admin: bool,
}

/// ClientSecretResponse
///
/// The payment intent's client secret, handed to the browser to confirm the card payment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ClientSecretResponse {
    pub client_secret: String,
}

/// PaymentReceipt
///
/// Outcome of confirming a payment against an order: the order is now paid with this
/// transaction, and the payment record was stored under `payment_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentReceipt {
    pub order_id: Uuid,
    pub paid: bool,
    pub transaction_id: String,
    pub payment_id: Uuid,
}

/// ErrorMessage
///
/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ErrorMessage {
    pub message: String,
}
