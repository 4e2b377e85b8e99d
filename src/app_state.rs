//! Application state management.
//!
//! This module defines the shared state structure that gets passed to all
//! Axum handlers via the `State` extractor. The `AppState` holds the
//! storage backends, the login challenge store, the token codec, the
//! session manager and the realtime relay.
//!
//! The state is cheaply cloneable (everything heavy sits behind an `Arc`)
//! so it can be handed to each request handler without copying resources.

use crate::auth::{NonceChallengeStore, TokenCodec};
use crate::config::CookieConfig;
use crate::domain::{MetricsPtr, RepositoryPtr};
use crate::relay::MessageRelay;
use crate::session::SessionManager;
use std::sync::Arc;

/// Shared application state passed to all Axum handlers.
///
/// This struct serves as the Dependency Injection container for the application.
/// It holds all shared resources needed by HTTP handlers and is cloned cheaply
/// for each request via Axum's `State` extractor.
///
/// # Design Principles
///
/// - **Dependency Inversion**: Handlers depend on abstractions (`Repository`,
///   `SessionStore`), not on the Postgres, Redis or in-memory implementations.
/// - **Immutable After Initialization**: The state is built once at startup.
///   The only interior mutability lives inside the challenge store and the
///   relay's connection registry, each behind its own lock.
/// - **Cheap Cloning**: Every field is an `Arc` or a small value.
///
/// # Lifecycle
///
/// 1. Created once in `create_router_with_config()` during startup
/// 2. Attached to the Axum router via `.with_state(app_state)`
/// 3. Cloned automatically by Axum for each incoming HTTP request
/// 4. Handlers extract via `State(state): State<AppState>`
#[derive(Clone)]
pub(crate) struct AppState {
    /// Metrics implementation for recording application events.
    ///
    /// Either Prometheus-backed (production) or no-op (testing/development).
    metrics: MetricsPtr,

    /// Users, messages and friendships.
    repository: RepositoryPtr,

    /// Outstanding login challenges, one per username.
    challenges: Arc<NonceChallengeStore>,

    /// Access/refresh token signing and verification.
    tokens: Arc<TokenCodec>,

    /// Session lifecycle on top of the configured `SessionStore`.
    sessions: Arc<SessionManager>,

    /// Realtime relay and its connection registry.
    relay: Arc<MessageRelay>,

    /// Attributes of the refresh token cookie.
    cookie: CookieConfig,

    /// Whether forwarded-for headers name the client address.
    trust_proxy_headers: bool,
}

impl AppState {
    // ---

    pub fn new(
        metrics: MetricsPtr,
        repository: RepositoryPtr,
        challenges: Arc<NonceChallengeStore>,
        tokens: Arc<TokenCodec>,
        sessions: Arc<SessionManager>,
        relay: Arc<MessageRelay>,
        cookie: CookieConfig,
        trust_proxy_headers: bool,
    ) -> Self {
        // ---
        AppState {
            metrics,
            repository,
            challenges,
            tokens,
            sessions,
            relay,
            cookie,
            trust_proxy_headers,
        }
    }

    /// Get a reference to the metrics implementation.
    pub(crate) fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }

    /// Get a reference to the repository implementation.
    pub(crate) fn repository(&self) -> &RepositoryPtr {
        // ---
        &self.repository
    }

    pub(crate) fn challenges(&self) -> &NonceChallengeStore {
        // ---
        &self.challenges
    }

    pub(crate) fn tokens(&self) -> &TokenCodec {
        // ---
        &self.tokens
    }

    pub(crate) fn sessions(&self) -> &SessionManager {
        // ---
        &self.sessions
    }

    /// Get a shared handle to the relay, for moving into a socket task.
    pub(crate) fn relay(&self) -> Arc<MessageRelay> {
        // ---
        self.relay.clone()
    }

    pub(crate) fn cookie(&self) -> &CookieConfig {
        // ---
        &self.cookie
    }

    pub(crate) fn trust_proxy_headers(&self) -> bool {
        // ---
        self.trust_proxy_headers
    }
}
