use std::env;
use thiserror::Error;

/// Fallback signing secret for local runs without `ACCESS_TOKEN_SECRET`.
const LOCAL_TOKEN_SECRET: &str = "parts-yard-local-token-secret";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
/// Upper bound for `TOKEN_TTL_HOURS`: one year.
pub const MAX_TOKEN_TTL_HOURS: i64 = 8760;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and pulled
/// into handlers and the access gate via `FromRef`.
#[derive(Clone)]
pub struct AppConfig {
    // Runtime environment marker. Controls which secrets are required.
    pub env: Env,
    // Accept the `x-user-email` header in place of a token. Only set by an explicit
    // `APP_ENV=local`, never by the fallback.
    pub dev_header_bypass: bool,
    // Listening port.
    pub port: u16,
    // Postgres connection string. `None` runs against the in-memory store (local only).
    pub database_url: Option<String>,
    // Shared secret used to sign and verify access tokens.
    pub jwt_secret: String,
    // Validity window of issued access tokens.
    pub token_ttl_hours: i64,
    // Stripe secret key. `None` selects the mock gateway (local only).
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
}

/// Env
///
/// Runtime context: `Local` allows development conveniences (in-memory store, mock
/// payments, header bypass), `Production` demands every secret explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// ConfigError
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Default for AppConfig {
    /// Safe, non-panicking values for test state setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            dev_header_bypass: false,
            port: DEFAULT_PORT,
            database_url: None,
            jwt_secret: LOCAL_TOKEN_SECRET.to_string(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            stripe_secret_key: None,
            stripe_api_base: DEFAULT_STRIPE_API_BASE.to_string(),
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables (call `dotenv` first).
    ///
    /// An unset or unknown `APP_ENV` runs as `Local` but without the header bypass.
    ///
    /// Fail-fast: in `Production`, a missing `DATABASE_URL`, `ACCESS_TOKEN_SECRET` or
    /// `STRIPE_SECRET_KEY` is an error. In `Local` they fall back to development defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let app_env = env::var("APP_ENV").unwrap_or_default();
        let env = match app_env.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };
        let dev_header_bypass = app_env == "local";

        let port = parse_or("PORT", DEFAULT_PORT)?;
        let token_ttl_hours = parse_or("TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS)?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
            });
        }
        let stripe_api_base =
            non_empty("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string());

        let database_url = non_empty("DATABASE_URL");
        let jwt_secret = non_empty("ACCESS_TOKEN_SECRET");
        let stripe_secret_key = non_empty("STRIPE_SECRET_KEY");

        match env {
            Env::Local => Ok(Self {
                env,
                dev_header_bypass,
                port,
                database_url,
                jwt_secret: jwt_secret.unwrap_or_else(|| LOCAL_TOKEN_SECRET.to_string()),
                token_ttl_hours,
                stripe_secret_key,
                stripe_api_base,
            }),
            Env::Production => Ok(Self {
                env,
                dev_header_bypass: false,
                port,
                database_url: Some(database_url.ok_or(ConfigError::Missing("DATABASE_URL"))?),
                jwt_secret: jwt_secret.ok_or(ConfigError::Missing("ACCESS_TOKEN_SECRET"))?,
                token_ttl_hours,
                stripe_secret_key: Some(
                    stripe_secret_key.ok_or(ConfigError::Missing("STRIPE_SECRET_KEY"))?,
                ),
                stripe_api_base,
            }),
        }
    }
}
