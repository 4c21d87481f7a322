use parts_yard::{
    models::{Document, Fields, Role, User},
    repository::{Collection, InMemoryRepository, Repository, merge_fields},
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

fn fields(value: serde_json::Value) -> Fields {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

// --- Keyed Collections ---

#[tokio::test]
async fn test_insert_generates_key_and_ignores_client_id() {
    let repo = InMemoryRepository::new();
    let client_id = Uuid::new_v4();

    let result = repo
        .insert(
            Collection::Parts,
            fields(json!({ "_id": client_id.to_string(), "name": "Gearbox" })),
        )
        .await
        .unwrap();

    assert!(result.acknowledged);
    assert_ne!(result.inserted_id, client_id);

    let stored = repo
        .find(Collection::Parts, result.inserted_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.fields.contains_key("_id"));
    assert_eq!(stored.fields.get("name"), Some(&json!("Gearbox")));
}

#[tokio::test]
async fn test_collections_are_isolated() {
    let repo = InMemoryRepository::new();
    let part = repo
        .insert(Collection::Parts, fields(json!({ "name": "Axle" })))
        .await
        .unwrap();

    assert!(repo.find(Collection::Orders, part.inserted_id).await.unwrap().is_none());
    assert!(repo.list(Collection::Reviews).await.unwrap().is_empty());
    assert_eq!(repo.list(Collection::Parts).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_preserves_insertion_order() {
    let repo = InMemoryRepository::new();
    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        ids.push(
            repo.insert(Collection::Reviews, fields(json!({ "text": name })))
                .await
                .unwrap()
                .inserted_id,
        );
    }

    let listed: Vec<Uuid> = repo
        .list(Collection::Reviews)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn test_find_by_email() {
    let repo = InMemoryRepository::new();
    repo.insert(Collection::Orders, fields(json!({ "email": "a@x.com" })))
        .await
        .unwrap();
    repo.insert(Collection::Orders, fields(json!({ "email": "b@x.com" })))
        .await
        .unwrap();
    repo.insert(Collection::Orders, fields(json!({ "note": "no owner" })))
        .await
        .unwrap();

    let found = repo.find_by_email(Collection::Orders, "a@x.com").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].email(), Some("a@x.com"));
    assert!(repo
        .find_by_email(Collection::Orders, "c@x.com")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_delete_reports_count() {
    let repo = InMemoryRepository::new();
    let id = Uuid::new_v4();
    repo.seed_document(
        Collection::Parts,
        Document {
            id,
            fields: fields(json!({ "name": "Hub" })),
        },
    )
    .await;

    assert_eq!(repo.delete(Collection::Parts, id).await.unwrap().deleted_count, 1);
    assert_eq!(repo.delete(Collection::Parts, id).await.unwrap().deleted_count, 0);
    assert_eq!(
        repo.delete(Collection::Payments, Uuid::new_v4())
            .await
            .unwrap()
            .deleted_count,
        0
    );
}

// --- Users ---

#[tokio::test]
async fn test_upsert_user_creates_then_merges() {
    let repo = InMemoryRepository::new();

    let created = repo
        .upsert_user("u@x.com", fields(json!({ "name": "U", "city": "Lyon" })))
        .await
        .unwrap();
    assert_eq!(created.matched_count, 0);
    assert_eq!(created.upserted_id.as_deref(), Some("u@x.com"));

    let merged = repo
        .upsert_user("u@x.com", fields(json!({ "name": "U2" })))
        .await
        .unwrap();
    assert_eq!(merged.matched_count, 1);
    assert_eq!(merged.modified_count, 1);
    assert_eq!(merged.upserted_id, None);

    // Same values again: matched but not modified.
    let unchanged = repo
        .upsert_user("u@x.com", fields(json!({ "name": "U2" })))
        .await
        .unwrap();
    assert_eq!(unchanged.matched_count, 1);
    assert_eq!(unchanged.modified_count, 0);

    let user = repo.get_user("u@x.com").await.unwrap().unwrap();
    assert_eq!(user.role, Role::Standard);
    assert_eq!(user.profile.get("name"), Some(&json!("U2")));
    assert_eq!(user.profile.get("city"), Some(&json!("Lyon")));
    assert_eq!(repo.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_upserts_leave_one_record() {
    let repo = Arc::new(InMemoryRepository::new());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.upsert_user("race@x.com", fields(json!({ "attempt": i })))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().upserted_id.is_some() {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(repo.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_set_role() {
    let repo = InMemoryRepository::new();
    repo.upsert_user("u@x.com", Fields::new()).await.unwrap();

    let granted = repo.set_role("u@x.com", Role::Admin).await.unwrap();
    assert_eq!((granted.matched_count, granted.modified_count), (1, 1));
    assert!(repo.get_user("u@x.com").await.unwrap().unwrap().is_admin());

    let again = repo.set_role("u@x.com", Role::Admin).await.unwrap();
    assert_eq!((again.matched_count, again.modified_count), (1, 0));

    // Unknown users are not created.
    let missing = repo.set_role("ghost@x.com", Role::Admin).await.unwrap();
    assert_eq!(missing.matched_count, 0);
    assert!(repo.get_user("ghost@x.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_seed_user_replaces_existing() {
    let repo = InMemoryRepository::new();
    repo.upsert_user("u@x.com", Fields::new()).await.unwrap();
    repo.seed_user(User {
        email: "u@x.com".to_string(),
        role: Role::Admin,
        profile: Fields::new(),
    })
    .await;

    let users = repo.list_users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert!(users[0].is_admin());
}

// --- Payments ---

#[tokio::test]
async fn test_record_payment_updates_order_and_inserts_payment() {
    let repo = InMemoryRepository::new();
    let order_id = repo
        .insert(
            Collection::Orders,
            fields(json!({ "email": "a@x.com", "price": 30 })),
        )
        .await
        .unwrap()
        .inserted_id;

    let receipt = repo
        .record_payment(
            order_id,
            "pi_abc",
            fields(json!({ "email": "a@x.com", "_id": "client-side", "price": 30 })),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(receipt.order_id, order_id);
    assert!(receipt.paid);

    let order = repo.find(Collection::Orders, order_id).await.unwrap().unwrap();
    assert_eq!(order.fields.get("paid"), Some(&json!(true)));
    assert_eq!(order.fields.get("price"), Some(&json!(30)));

    let payment = repo
        .find(Collection::Payments, receipt.payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.fields.get("transactionId"), Some(&json!("pi_abc")));
    assert_eq!(payment.fields.get("orderId"), Some(&json!(order_id.to_string())));
    assert!(!payment.fields.contains_key("_id"));
}

#[tokio::test]
async fn test_record_payment_missing_order_writes_nothing() {
    let repo = InMemoryRepository::new();

    let receipt = repo
        .record_payment(Uuid::new_v4(), "pi_abc", fields(json!({ "price": 1 })))
        .await
        .unwrap();

    assert!(receipt.is_none());
    assert!(repo.list(Collection::Payments).await.unwrap().is_empty());
}

// --- Merge ---

#[test]
fn test_merge_fields() {
    let mut stored = fields(json!({ "a": 1, "b": 2 }));

    assert!(merge_fields(&mut stored, fields(json!({ "b": 3, "c": 4 }))));
    assert_eq!(stored, fields(json!({ "a": 1, "b": 3, "c": 4 })));

    assert!(!merge_fields(&mut stored, fields(json!({ "a": 1 }))));
    assert!(!merge_fields(&mut stored, Fields::new()));
}
