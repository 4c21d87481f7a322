use crate::models::{
    DeleteResult, Document, Fields, InsertResult, PaymentReceipt, Role, UpdateResult, User,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row, types::Json};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Collection
///
/// The keyed document collections. Users live apart, keyed by email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Parts,
    Orders,
    Reviews,
    Payments,
}

impl Collection {
    /// Backing table name. Only these fixed names are ever interpolated into SQL.
    pub const fn table(self) -> &'static str {
        match self {
            Collection::Parts => "parts",
            Collection::Orders => "orders",
            Collection::Reviews => "reviews",
            Collection::Payments => "payments",
        }
    }
}

/// RepositoryError
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// The contract for every persistence operation the handlers perform. Handlers only see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are interchangeable.
///
/// Writes that span more than one record (`record_payment`) are atomic in every
/// implementation.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Keyed collections ---
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, RepositoryError>;
    async fn find(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, RepositoryError>;
    // Documents whose `email` field equals `email`.
    async fn find_by_email(
        &self,
        collection: Collection,
        email: &str,
    ) -> Result<Vec<Document>, RepositoryError>;
    // A client-supplied `_id` is discarded; the store generates the key.
    async fn insert(
        &self,
        collection: Collection,
        fields: Fields,
    ) -> Result<InsertResult, RepositoryError>;
    async fn delete(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<DeleteResult, RepositoryError>;

    // --- Users ---
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;
    async fn get_user(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    /// Creates the user if missing, otherwise merges `profile` over the stored profile
    /// (keys present in `profile` win, other stored keys are kept).
    async fn upsert_user(
        &self,
        email: &str,
        profile: Fields,
    ) -> Result<UpdateResult, RepositoryError>;
    /// Changes the role of an existing user. Never creates a record.
    async fn set_role(&self, email: &str, role: Role) -> Result<UpdateResult, RepositoryError>;

    // --- Payments ---
    /// Marks the order paid with `transaction_id` and stores `payment` in the payments
    /// collection as one unit. Returns `None` (and writes nothing) when the order is missing.
    async fn record_payment(
        &self,
        order_id: Uuid,
        transaction_id: &str,
        payment: Fields,
    ) -> Result<Option<PaymentReceipt>, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Merges `incoming` into `existing` the way a `$set` does. Returns whether anything changed.
pub fn merge_fields(existing: &mut Fields, incoming: Fields) -> bool {
    let mut changed = false;
    for (key, value) in incoming {
        if existing.get(&key) != Some(&value) {
            existing.insert(key, value);
            changed = true;
        }
    }
    changed
}

fn payment_body(order_id: Uuid, transaction_id: &str, mut payment: Fields) -> Fields {
    payment.remove("_id");
    payment.insert("orderId".to_string(), Value::String(order_id.to_string()));
    payment.insert(
        "transactionId".to_string(),
        Value::String(transaction_id.to_string()),
    );
    payment
}

// --- PostgreSQL ---

/// PostgresRepository
///
/// Document store on PostgreSQL: one table per collection, each row a generated UUID and
/// a JSONB body. See `migrations/` for the schema.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, RepositoryError> {
    let email: String = row.try_get("email")?;
    let role: String = row.try_get("role")?;
    let Json(profile): Json<Fields> = row.try_get("profile")?;
    Ok(User {
        email,
        role: Role::from_stored(&role),
        profile,
    })
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, RepositoryError> {
        let query = format!(
            "SELECT id, body FROM {} ORDER BY created_at ASC",
            collection.table()
        );
        let rows: Vec<(Uuid, Json<Fields>)> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(id, Json(fields))| Document { id, fields })
            .collect())
    }

    async fn find(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, RepositoryError> {
        let query = format!("SELECT id, body FROM {} WHERE id = $1", collection.table());
        let row: Option<(Uuid, Json<Fields>)> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id, Json(fields))| Document { id, fields }))
    }

    async fn find_by_email(
        &self,
        collection: Collection,
        email: &str,
    ) -> Result<Vec<Document>, RepositoryError> {
        let query = format!(
            "SELECT id, body FROM {} WHERE body->>'email' = $1 ORDER BY created_at ASC",
            collection.table()
        );
        let rows: Vec<(Uuid, Json<Fields>)> = sqlx::query_as(&query)
            .bind(email)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, Json(fields))| Document { id, fields })
            .collect())
    }

    async fn insert(
        &self,
        collection: Collection,
        mut fields: Fields,
    ) -> Result<InsertResult, RepositoryError> {
        fields.remove("_id");
        let id = Uuid::new_v4();
        let query = format!("INSERT INTO {} (id, body) VALUES ($1, $2)", collection.table());
        sqlx::query(&query)
            .bind(id)
            .bind(Json(&fields))
            .execute(&self.pool)
            .await?;
        Ok(InsertResult::new(id))
    }

    async fn delete(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<DeleteResult, RepositoryError> {
        let query = format!("DELETE FROM {} WHERE id = $1", collection.table());
        let result = sqlx::query(&query).bind(id).execute(&self.pool).await?;
        Ok(DeleteResult::new(result.rows_affected()))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query("SELECT email, role, profile FROM users ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn get_user(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT email, role, profile FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// upsert_user
    ///
    /// Reads the stored profile under a row lock, merges in Rust and writes back only when
    /// something changed, so `modifiedCount` reports real changes.
    async fn upsert_user(
        &self,
        email: &str,
        profile: Fields,
    ) -> Result<UpdateResult, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(Json<Fields>,)> =
            sqlx::query_as("SELECT profile FROM users WHERE email = $1 FOR UPDATE")
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?;

        let result = match existing {
            Some((Json(mut stored),)) => {
                let changed = merge_fields(&mut stored, profile);
                if changed {
                    sqlx::query(
                        "UPDATE users SET profile = $2, updated_at = NOW() WHERE email = $1",
                    )
                    .bind(email)
                    .bind(Json(&stored))
                    .execute(&mut *tx)
                    .await?;
                }
                UpdateResult {
                    acknowledged: true,
                    matched_count: 1,
                    modified_count: u64::from(changed),
                    upserted_id: None,
                }
            }
            None => {
                // A concurrent upsert of the same email may have won the race; then this is a no-op
                // insert and the next call merges.
                sqlx::query(
                    "INSERT INTO users (email, role, profile) VALUES ($1, $2, $3) \
                     ON CONFLICT (email) DO NOTHING",
                )
                .bind(email)
                .bind(Role::Standard.as_str())
                .bind(Json(&profile))
                .execute(&mut *tx)
                .await?;
                UpdateResult {
                    acknowledged: true,
                    matched_count: 0,
                    modified_count: 0,
                    upserted_id: Some(email.to_string()),
                }
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    async fn set_role(&self, email: &str, role: Role) -> Result<UpdateResult, RepositoryError> {
        let matched: Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        let Some((current,)) = matched else {
            return Ok(UpdateResult {
                acknowledged: true,
                ..UpdateResult::default()
            });
        };

        let result = sqlx::query(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE email = $1 AND role <> $2",
        )
        .bind(email)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        tracing::debug!(email, from = %current, to = role.as_str(), "role update");
        Ok(UpdateResult {
            acknowledged: true,
            matched_count: 1,
            modified_count: result.rows_affected(),
            upserted_id: None,
        })
    }

    /// record_payment
    ///
    /// Both writes run in one transaction; an early return drops `tx`, which rolls back.
    async fn record_payment(
        &self,
        order_id: Uuid,
        transaction_id: &str,
        payment: Fields,
    ) -> Result<Option<PaymentReceipt>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE orders \
             SET body = body || jsonb_build_object('paid', true, 'transactionId', $2::text) \
             WHERE id = $1",
        )
        .bind(order_id)
        .bind(transaction_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        let payment_id = Uuid::new_v4();
        sqlx::query("INSERT INTO payments (id, body) VALUES ($1, $2)")
            .bind(payment_id)
            .bind(Json(payment_body(order_id, transaction_id, payment)))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(PaymentReceipt {
            order_id,
            paid: true,
            transaction_id: transaction_id.to_string(),
            payment_id,
        }))
    }
}

// --- In-Memory ---

#[derive(Default)]
struct MemoryStore {
    collections: HashMap<Collection, Vec<Document>>,
    users: Vec<User>,
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory behind one `RwLock`. Used by the test
/// suites and by local runs started without `DATABASE_URL`. Insertion order is preserved.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<MemoryStore>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user record directly, bypassing the upsert rules (e.g. to create an admin).
    pub async fn seed_user(&self, user: User) {
        let mut store = self.store.write().await;
        store.users.retain(|u| u.email != user.email);
        store.users.push(user);
    }

    /// Seeds a document with a known id.
    pub async fn seed_document(&self, collection: Collection, document: Document) {
        let mut store = self.store.write().await;
        store.collections.entry(collection).or_default().push(document);
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store.collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn find(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store
            .collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }

    async fn find_by_email(
        &self,
        collection: Collection,
        email: &str,
    ) -> Result<Vec<Document>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store
            .collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| d.email() == Some(email))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        collection: Collection,
        mut fields: Fields,
    ) -> Result<InsertResult, RepositoryError> {
        fields.remove("_id");
        let id = Uuid::new_v4();
        let mut store = self.store.write().await;
        store
            .collections
            .entry(collection)
            .or_default()
            .push(Document { id, fields });
        Ok(InsertResult::new(id))
    }

    async fn delete(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<DeleteResult, RepositoryError> {
        let mut store = self.store.write().await;
        let Some(docs) = store.collections.get_mut(&collection) else {
            return Ok(DeleteResult::new(0));
        };
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(DeleteResult::new((before - docs.len()) as u64))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.store.read().await.users.clone())
    }

    async fn get_user(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.email == email).cloned())
    }

    async fn upsert_user(
        &self,
        email: &str,
        profile: Fields,
    ) -> Result<UpdateResult, RepositoryError> {
        let mut store = self.store.write().await;
        if let Some(user) = store.users.iter_mut().find(|u| u.email == email) {
            let changed = merge_fields(&mut user.profile, profile);
            return Ok(UpdateResult {
                acknowledged: true,
                matched_count: 1,
                modified_count: u64::from(changed),
                upserted_id: None,
            });
        }

        store.users.push(User {
            email: email.to_string(),
            role: Role::Standard,
            profile,
        });
        Ok(UpdateResult {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(email.to_string()),
        })
    }

    async fn set_role(&self, email: &str, role: Role) -> Result<UpdateResult, RepositoryError> {
        let mut store = self.store.write().await;
        let Some(user) = store.users.iter_mut().find(|u| u.email == email) else {
            return Ok(UpdateResult {
                acknowledged: true,
                ..UpdateResult::default()
            });
        };
        let changed = user.role != role;
        user.role = role;
        Ok(UpdateResult {
            acknowledged: true,
            matched_count: 1,
            modified_count: u64::from(changed),
            upserted_id: None,
        })
    }

    async fn record_payment(
        &self,
        order_id: Uuid,
        transaction_id: &str,
        payment: Fields,
    ) -> Result<Option<PaymentReceipt>, RepositoryError> {
        // One write guard spans both mutations.
        let mut store = self.store.write().await;

        let Some(order) = store
            .collections
            .get_mut(&Collection::Orders)
            .and_then(|orders| orders.iter_mut().find(|o| o.id == order_id))
        else {
            return Ok(None);
        };
        order.fields.insert("paid".to_string(), Value::Bool(true));
        order.fields.insert(
            "transactionId".to_string(),
            Value::String(transaction_id.to_string()),
        );

        let payment_id = Uuid::new_v4();
        store
            .collections
            .entry(Collection::Payments)
            .or_default()
            .push(Document {
                id: payment_id,
                fields: payment_body(order_id, transaction_id, payment),
            });

        Ok(Some(PaymentReceipt {
            order_id,
            paid: true,
            transaction_id: transaction_id.to_string(),
            payment_id,
        }))
    }
}
