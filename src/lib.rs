// src/lib.rs
use anyhow::Result;
use app_state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::{Arc, Weak};
use std::time::Duration;

use handlers::*;

// Public exports (visible outside this module)
pub mod auth;
pub mod domain;
pub mod relay;

// Internal-only exports (sibling access within this module)
mod app_state;
mod config;
mod handlers;
mod infrastructure;
mod session;

// Hoist up only the public symbol(s)
pub use handlers::REFRESH_COOKIE;
pub use session::{IssuedSession, SessionManager};

pub use config::*;

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    connect_with_retry, // ---
    create_memory_repository,
    create_memory_session_store,
    create_noop_metrics,
    create_postgres_repository,
    create_prom_metrics,
    create_redis_session_store,
    run_migrations,
};

use auth::{NonceChallengeStore, TokenCodec};
use domain::{RepositoryPtr, SessionStorePtr};
use relay::{ConnectionRegistry, MessageRelay};

/// How often expired login challenges are swept from memory.
const CHALLENGE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the HTTP router with every dependency determined by environment variables.
pub async fn create_router() -> Result<Router> {
    // ---
    let config = AppConfig::from_env()?;
    create_router_with_config(config).await
}

/// Build the HTTP router from an explicit configuration.
///
/// Connects to storage (retrying PostgreSQL until it is up), wires the auth
/// core and the relay into `AppState`, and starts the challenge sweeper.
pub async fn create_router_with_config(config: AppConfig) -> Result<Router> {
    // ---
    tracing_subscriber::fmt::try_init().ok(); // Ignores if already initialized

    let metrics = match config.metrics {
        MetricsType::Prom => create_prom_metrics()?,
        MetricsType::Noop => create_noop_metrics()?,
    };

    let (repository, session_store) = create_storage(&config.storage).await?;

    let tokens = Arc::new(TokenCodec::new(
        &config.auth.access_token_secret,
        &config.auth.refresh_token_secret,
        config.auth.refresh_token_ttl,
    ));
    let sessions = Arc::new(SessionManager::new(
        session_store,
        tokens.clone(),
        config.auth.rotate_refresh_tokens,
    ));

    let challenges = Arc::new(NonceChallengeStore::new());
    spawn_challenge_sweeper(Arc::downgrade(&challenges));

    let relay = Arc::new(MessageRelay::new(
        repository.clone(),
        Arc::new(ConnectionRegistry::new()),
        metrics.clone(),
    ));

    // Build application state with all dependencies
    let app_state = AppState::new(
        metrics,
        repository,
        challenges,
        tokens,
        sessions,
        relay,
        config.cookie,
        config.server.trust_proxy_headers,
    );

    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest(
            "/api",
            Router::new()
                .route("/register", post(register))
                .route("/nonce", get(nonce))
                .route("/login", post(login))
                .route("/refresh", get(refresh))
                .route("/ws/chat", get(chat_socket))
                .nest(
                    "/protected",
                    Router::new()
                        .route("/logout", post(logout))
                        .route("/me", get(me))
                        .route("/profile", get(me))
                        .route("/history/{username}", get(history))
                        .route("/users/{username}/public-key", get(public_key))
                        .route("/friends", get(list_friends).post(add_friend)),
                ),
        )
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            track_http_metrics,
        ))
        .with_state(app_state);

    Ok(router)
}

async fn create_storage(storage: &StorageConfig) -> Result<(RepositoryPtr, SessionStorePtr)> {
    // ---
    match storage {
        StorageConfig::Memory => {
            tracing::warn!("Using in-memory storage; all data is lost on restart");
            Ok((create_memory_repository(), create_memory_session_store()))
        }
        StorageConfig::Postgres { database, redis } => {
            let pool = connect_with_retry(database).await?;
            let client = ::redis::Client::open(redis.url.as_str())?;
            Ok((
                create_postgres_repository(pool),
                create_redis_session_store(client),
            ))
        }
    }
}

/// Periodically drops expired challenges. Stops once the store is gone.
fn spawn_challenge_sweeper(store: Weak<NonceChallengeStore>) {
    // ---
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CHALLENGE_SWEEP_INTERVAL);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                break;
            };
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!("Purged {} expired login challenges", purged);
            }
        }
    });
}
