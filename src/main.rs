use parts_yard::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    payments::{MockPaymentGateway, PaymentsState, StripeGateway},
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, the document store and the payments
/// provider, then serves the API until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "parts_yard=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.dev_header_bypass {
        tracing::warn!("APP_ENV=local: the x-user-email header is accepted in place of a token.");
    }

    // 3. Document store
    let repo: RepositoryState = match &config.database_url {
        Some(url) => {
            let pool = match PgPoolOptions::new().max_connections(5).connect(url).await {
                Ok(pool) => pool,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        "failed to connect to Postgres, check DATABASE_URL"
                    );
                    std::process::exit(1);
                }
            };
            let postgres = PostgresRepository::new(pool);
            if let Err(e) = postgres.migrate().await {
                tracing::error!(error = %e, "failed to run migrations");
                std::process::exit(1);
            }
            tracing::info!("Connected to Postgres, migrations applied.");
            Arc::new(postgres)
        }
        None => {
            // Only reachable in Env::Local; production config requires DATABASE_URL.
            tracing::warn!(
                "DATABASE_URL not set, using the in-memory store. Data is lost on exit."
            );
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Payments provider
    let payments: PaymentsState = match &config.stripe_secret_key {
        Some(key) => Arc::new(StripeGateway::new(&config.stripe_api_base, key)),
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, payment intents are mocked.");
            Arc::new(MockPaymentGateway::new())
        }
    };

    // 5. State, router, server
    let port = config.port;
    let app = create_router(AppState {
        repo,
        payments,
        config,
    });

    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, port, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on 0.0.0.0:{port}");
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui"
    );

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
