use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use parts_yard::{
    AppError, AppState,
    auth::{self, AuthUser, Claims, DEV_USER_HEADER},
    config::{AppConfig, Env, MAX_TOKEN_TTL_HOURS},
    models::{Fields, Role, User},
    payments::MockPaymentGateway,
    repository::{InMemoryRepository, Repository},
};
use std::{sync::Arc, time::SystemTime};

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const ALICE: &str = "alice@example.com";
const BOB: &str = "bob@example.com";

fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn create_token(email: &str, secret: &str, exp: u64) -> String {
    let claims = Claims {
        email: email.to_string(),
        iat: now() as usize,
        exp: exp as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn user(email: &str, role: Role) -> User {
    User {
        email: email.to_string(),
        role,
        profile: Fields::new(),
    }
}

async fn create_app_state(env: Env, users: Vec<User>) -> AppState {
    create_app_state_with_bypass(env, true, users).await
}

async fn create_app_state_with_bypass(env: Env, bypass: bool, users: Vec<User>) -> AppState {
    let repo = InMemoryRepository::new();
    for u in users {
        repo.seed_user(u).await;
    }

    let mut config = AppConfig::default();
    config.env = env;
    config.dev_header_bypass = bypass;
    config.jwt_secret = TEST_JWT_SECRET.to_string();

    AppState {
        repo: Arc::new(repo),
        payments: Arc::new(MockPaymentGateway::new()),
        config,
    }
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn parts_with_authorization(value: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(value).unwrap(),
    );
    parts
}

// --- Extractor Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let token = create_token(ALICE, TEST_JWT_SECRET, now() + 3600);
    let app_state = create_app_state(Env::Production, vec![]).await;

    let mut parts = parts_with_authorization(&format!("Bearer {token}"));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap().email, ALICE);
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Production, vec![]).await;
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized));
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_wrong_signature() {
    let token = create_token(ALICE, "some-other-secret", now() + 3600);
    let app_state = create_app_state(Env::Production, vec![]).await;

    let mut parts = parts_with_authorization(&format!("Bearer {token}"));
    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auth_failure_with_garbage_token() {
    let app_state = create_app_state(Env::Production, vec![]).await;

    let mut parts = parts_with_authorization("Bearer not.a.jwt");
    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    // Well past the default validation leeway.
    let token = create_token(ALICE, TEST_JWT_SECRET, now() - 3600);
    let app_state = create_app_state(Env::Production, vec![]).await;

    let mut parts = parts_with_authorization(&format!("Bearer {token}"));
    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auth_failure_with_non_bearer_scheme() {
    let token = create_token(ALICE, TEST_JWT_SECRET, now() + 3600);
    let app_state = create_app_state(Env::Production, vec![]).await;

    let mut parts = parts_with_authorization(&format!("Basic {token}"));
    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auth_failure_with_empty_bearer() {
    let app_state = create_app_state(Env::Production, vec![]).await;

    let mut parts = parts_with_authorization("Bearer ");
    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_issued_token_is_accepted() {
    let token = auth::issue_token(BOB, TEST_JWT_SECRET, 1).unwrap();
    let claims = auth::verify_token(&token, TEST_JWT_SECRET).unwrap();

    assert_eq!(claims.email, BOB);
    assert!(claims.exp > claims.iat);
    assert!(auth::verify_token(&token, "wrong-secret").is_err());
}

#[tokio::test]
async fn test_local_bypass_success() {
    let app_state = create_app_state(Env::Local, vec![user(ALICE, Role::Admin)]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static(DEV_USER_HEADER),
        header::HeaderValue::from_static(ALICE),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(auth_user.unwrap().email, ALICE);
}

#[tokio::test]
async fn test_local_bypass_unknown_user_falls_through() {
    let app_state = create_app_state(Env::Local, vec![]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static(DEV_USER_HEADER),
        header::HeaderValue::from_static(ALICE),
    );

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_local_bypass_requires_explicit_opt_in() {
    // Local env reached through the fallback, not through `APP_ENV=local`.
    let app_state =
        create_app_state_with_bypass(Env::Local, false, vec![user(ALICE, Role::Admin)]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static(DEV_USER_HEADER),
        header::HeaderValue::from_static(ALICE),
    );

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let app_state = create_app_state(Env::Production, vec![user(ALICE, Role::Admin)]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static(DEV_USER_HEADER),
        header::HeaderValue::from_static(ALICE),
    );

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_issue_token_with_huge_ttl_is_clamped() {
    let token = auth::issue_token(BOB, TEST_JWT_SECRET, i64::MAX).unwrap();
    let claims = auth::verify_token(&token, TEST_JWT_SECRET).unwrap();

    let max_secs = (MAX_TOKEN_TTL_HOURS * 3600) as usize;
    assert!(claims.exp - claims.iat <= max_secs);
}

// --- Authorization Predicates ---

#[tokio::test]
async fn test_ensure_self() {
    let alice = AuthUser {
        email: ALICE.to_string(),
    };
    assert!(alice.ensure_self(ALICE).is_ok());
    assert!(matches!(alice.ensure_self(BOB), Err(AppError::Forbidden)));
}

#[tokio::test]
async fn test_ensure_admin_uses_stored_role() {
    let repo = InMemoryRepository::new();
    repo.seed_user(user(ALICE, Role::Admin)).await;
    repo.seed_user(user(BOB, Role::Standard)).await;

    let alice = AuthUser {
        email: ALICE.to_string(),
    };
    let bob = AuthUser {
        email: BOB.to_string(),
    };
    let stranger = AuthUser {
        email: "nobody@example.com".to_string(),
    };

    assert!(alice.ensure_admin(&repo).await.is_ok());
    assert!(matches!(bob.ensure_admin(&repo).await, Err(AppError::Forbidden)));
    assert!(matches!(
        stranger.ensure_admin(&repo).await,
        Err(AppError::Forbidden)
    ));
}

#[tokio::test]
async fn test_ensure_owner_or_admin() {
    let repo = InMemoryRepository::new();
    repo.seed_user(user(ALICE, Role::Admin)).await;
    repo.upsert_user(BOB, Fields::new()).await.unwrap();

    let alice = AuthUser {
        email: ALICE.to_string(),
    };
    let bob = AuthUser {
        email: BOB.to_string(),
    };

    // Owner passes without a store lookup mattering.
    assert!(bob.ensure_owner_or_admin(Some(BOB), &repo).await.is_ok());
    // Admin passes on someone else's resource.
    assert!(alice.ensure_owner_or_admin(Some(BOB), &repo).await.is_ok());
    // Non-owner, non-admin is refused, as is an ownerless resource.
    assert!(bob.ensure_owner_or_admin(Some(ALICE), &repo).await.is_err());
    assert!(bob.ensure_owner_or_admin(None, &repo).await.is_err());
}
