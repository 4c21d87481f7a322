use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env, MAX_TOKEN_TTL_HOURS},
    error::AppError,
    repository::{Repository, RepositoryState},
};

/// Header accepted in place of a bearer token when `APP_ENV=local` is set explicitly.
pub const DEV_USER_HEADER: &str = "x-user-email";

/// Claims
///
/// The payload of an access token. Signed with the shared secret and validated on every
/// gated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The identity: the email the token was issued for.
    pub email: String,
    /// Issued At (iat).
    pub iat: usize,
    /// Expiration Time (exp).
    pub exp: usize,
}

/// Signs an access token for `email`, valid for `ttl_hours` (clamped to
/// `1..=MAX_TOKEN_TTL_HOURS`).
pub fn issue_token(
    email: &str,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let ttl = Duration::hours(ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS));
    let claims = Claims {
        email: email.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verifies signature and expiry and returns the claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// AuthUser
///
/// The identity claim of an authenticated request. Its presence in a handler signature is
/// what makes a route bearer-gated.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub email: String,
}

impl AuthUser {
    /// Self-match: the requested email must be the caller's own.
    pub fn ensure_self(&self, email: &str) -> Result<(), AppError> {
        if self.email == email {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Admin-match: the caller's *stored* role must be `admin`. An unknown caller is refused.
    pub async fn ensure_admin(&self, repo: &dyn Repository) -> Result<(), AppError> {
        match repo.get_user(&self.email).await? {
            Some(user) if user.is_admin() => Ok(()),
            _ => Err(AppError::Forbidden),
        }
    }

    /// Owner-or-admin: passes on self-match against `owner`, otherwise requires admin.
    pub async fn ensure_owner_or_admin(
        &self,
        owner: Option<&str>,
        repo: &dyn Repository,
    ) -> Result<(), AppError> {
        if owner == Some(self.email.as_str()) {
            return Ok(());
        }
        self.ensure_admin(repo).await
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: with `APP_ENV=local` set explicitly, an `x-user-email` header naming a
///    stored user is accepted.
/// 2. No `Authorization` header: `Unauthorized` (401).
/// 3. Header present but not `Bearer <token>`, or a token that fails signature/expiry
///    checks: `Forbidden` (403).
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local && config.dev_header_bypass {
            if let Some(email) = parts
                .headers
                .get(DEV_USER_HEADER)
                .and_then(|value| value.to_str().ok())
            {
                let repo = RepositoryState::from_ref(state);
                if let Some(user) = repo.get_user(email).await? {
                    tracing::debug!(email = %user.email, "local auth bypass");
                    return Ok(AuthUser { email: user.email });
                }
            }
        }

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Forbidden)?;

        let claims = verify_token(token, &config.jwt_secret).map_err(|e| {
            tracing::debug!(error = %e, "rejected access token");
            AppError::Forbidden
        })?;

        Ok(AuthUser {
            email: claims.email,
        })
    }
}
