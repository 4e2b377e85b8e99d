// src/config.rs

//! Application configuration loaded from environment variables.
//!
//! This module defines all startup-time configuration for the service.
//! Configuration is validated eagerly and failures are treated as
//! deployment errors rather than recoverable runtime conditions.

use anyhow::Result;
use std::time::Duration;

// ============================================================
// Local macros (config-only, intentionally explicit)
// ============================================================

/// Reads a required environment variable.
///
/// # Behavior
/// - Fails fast if the variable is missing
/// - Produces a clear, human-readable error message
/// - Intended for startup-time configuration validation
///
/// Missing configuration is treated as a deployment error,
/// not a recoverable runtime condition.
macro_rules! required_env {
    // ---
    ($key:literal) => {
        std::env::var($key)
            .map_err(|_| anyhow::anyhow!(concat!("Missing required configuration: ", $key)))?
    };
}

/// Reads an optional environment variable and attempts to parse it.
///
/// If the variable is missing or cannot be parsed, the provided
/// default value is used. This macro is appropriate for non-critical
/// tuning parameters where fallback behavior is acceptable.
macro_rules! optional_env_parse {
    // ---
    ($key:literal, $ty:ty, $default:expr) => {
        std::env::var($key)
            .ok()
            .and_then(|v| v.parse::<$ty>().ok())
            .unwrap_or($default)
    };
}

#[cfg(test)]
/// Asserts that a configuration constructor fails due to a missing
/// required environment variable.
///
/// This macro is intended for config unit tests only and enforces
/// consistent error messages across failure cases.
macro_rules! assert_missing_config {
    // ---
    ($expr:expr, $key:literal) => {{
        let err = $expr.expect_err("expected configuration error");
        assert!(
            err.to_string()
                .contains(concat!("Missing required configuration: ", $key)),
            "unexpected error: {err}"
        );
    }};
}

// ============================================================
// Public configuration facade
// ============================================================

/// Aggregated application configuration.
///
/// This is the single source of truth for startup configuration.
/// All required configuration is validated eagerly during initialization.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: server::ServerConfig,
    pub storage: storage::StorageConfig,
    pub auth: auth::AuthConfig,
    pub cookie: cookie::CookieConfig,
    pub metrics: metrics::MetricsType,
}

impl AppConfig {
    /// Loads and validates all application configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if any required configuration is missing or invalid.
    /// This function is intended to be called exactly once at startup.
    pub fn from_env() -> Result<Self> {
        // ---
        Ok(Self {
            server: server::ServerConfig::from_env()?,
            storage: storage::StorageConfig::from_env()?,
            auth: auth::AuthConfig::from_env()?,
            cookie: cookie::CookieConfig::from_env()?,
            metrics: metrics::MetricsType::from_env()?,
        })
    }
}

// ============================================================
// Server configuration
// ============================================================

mod server {
    // ---
    use super::*;

    #[derive(Debug, Clone)]
    pub struct ServerConfig {
        /// Address the HTTP listener binds to. Defaults to `127.0.0.1:8080`.
        pub bind_addr: String,

        /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
        /// Only enable behind a reverse proxy that overwrites both headers;
        /// otherwise clients can put anything there. Defaults to `false`.
        pub trust_proxy_headers: bool,
    }

    impl ServerConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let bind_addr =
                std::env::var("CHAT_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
            let trust_proxy_headers = optional_env_parse!("CHAT_TRUST_PROXY_HEADERS", bool, false);

            Ok(Self {
                bind_addr,
                trust_proxy_headers,
            })
        }
    }
}
pub use server::ServerConfig;

// ============================================================
// Storage configuration
// ============================================================

mod storage {
    // ---
    use super::*;

    /// Which backends hold users, messages and sessions.
    #[derive(Debug, Clone)]
    pub enum StorageConfig {
        /// Everything in process memory. Development and tests only.
        Memory,

        /// PostgreSQL for users/messages/friendships, Redis for sessions.
        Postgres {
            database: super::database::DatabaseConfig,
            redis: super::redis::RedisConfig,
        },
    }

    impl StorageConfig {
        /// Reads `CHAT_STORAGE_TYPE` (`postgres` by default, or `memory`).
        ///
        /// # Errors
        /// Unknown storage types are rejected; the Postgres variant also
        /// requires its database and Redis settings.
        pub fn from_env() -> Result<Self> {
            // ---
            let kind = std::env::var("CHAT_STORAGE_TYPE").unwrap_or_else(|_| "postgres".to_string());

            match kind.as_str() {
                "memory" => Ok(Self::Memory),
                "postgres" => Ok(Self::Postgres {
                    database: super::database::DatabaseConfig::from_env()?,
                    redis: super::redis::RedisConfig::from_env()?,
                }),
                other => Err(anyhow::anyhow!(
                    "Invalid CHAT_STORAGE_TYPE '{other}' (expected 'postgres' or 'memory')"
                )),
            }
        }
    }
}
pub use storage::StorageConfig;

// ============================================================
// Database configuration
// ============================================================

mod database {
    // ---
    use super::*;

    /// Database-related configuration derived from environment variables.
    ///
    /// Required when storage is `postgres`, and validated eagerly during
    /// startup.
    #[derive(Debug, Clone)]
    pub struct DatabaseConfig {
        /// PostgreSQL connection string.
        pub database_url: String,

        /// Number of retry attempts when initializing the database connection. Defaults to 50.
        pub retry_count: u32,

        /// Maximum time to wait when acquiring a connection from the pool. Defaults to 30 seconds.
        pub acquire_timeout: Duration,

        /// Minimum number of connections to keep in the pool, even when idle. Defaults to 2.
        pub min_connections: u32,

        /// Maximum number of connections to be open concurrently. Defaults to 15
        pub max_connections: u32,
    }

    impl DatabaseConfig {
        /// Builds a [`DatabaseConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        /// Startup will fail fast rather than continuing with incomplete
        /// or invalid configuration.
        pub fn from_env() -> Result<Self> {
            // ---
            let database_url = required_env!("DATABASE_URL");
            let retry_count = optional_env_parse!("CHAT_DB_RETRY_COUNT", u32, 50);
            let acquire_timeout_secs = optional_env_parse!("CHAT_DB_ACQUIRE_TIMEOUT_SEC", u64, 30);
            let min_connections = optional_env_parse!("CHAT_DB_MIN_CONNECTIONS", u32, 2);
            let max_connections = optional_env_parse!("CHAT_DB_MAX_CONNECTIONS", u32, 15);

            Ok(Self {
                database_url,
                retry_count,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
                min_connections,
                max_connections,
            })
        }
    }
}
pub use database::DatabaseConfig;

// ============================================================
// Redis configuration
// ============================================================

mod redis {
    // ---
    use super::*;

    /// Redis holds session records, each with a TTL equal to its lifetime.
    #[derive(Debug, Clone)]
    pub struct RedisConfig {
        /// Redis connection string.
        pub url: String,
    }

    impl RedisConfig {
        /// Builds a [`RedisConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let url = required_env!("CHAT_REDIS_URL");

            Ok(Self { url })
        }
    }
}
pub use redis::RedisConfig;

// ============================================================
// Token / session configuration
// ============================================================

mod auth {
    // ---
    use super::*;
    use std::fmt;

    /// Shortest allowed refresh token (and session) lifetime.
    pub const MIN_REFRESH_TTL: Duration = Duration::from_secs(3600);

    /// Longest allowed refresh token (and session) lifetime.
    pub const MAX_REFRESH_TTL: Duration = Duration::from_secs(86_400);

    /// Signing secrets and session lifetime policy.
    ///
    /// The two secrets are security-critical, must be provided explicitly
    /// and must differ from each other.
    #[derive(Clone)]
    pub struct AuthConfig {
        /// HMAC secret for access tokens (HS256).
        pub access_token_secret: String,

        /// HMAC secret for refresh tokens (HS512).
        pub refresh_token_secret: String,

        /// Lifetime of refresh tokens and their sessions, clamped to 1h..=24h.
        pub refresh_token_ttl: Duration,

        /// Replace the session on every refresh. Defaults to false.
        pub rotate_refresh_tokens: bool,
    }

    impl AuthConfig {
        /// Builds an [`AuthConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if either secret is missing or empty, or if both
        /// secrets are the same.
        pub fn from_env() -> Result<Self> {
            // ---
            let access_token_secret = required_env!("ACCESS_TOKEN_SECRET");
            let refresh_token_secret = required_env!("REFRESH_TOKEN_SECRET");
            let ttl_secs = optional_env_parse!("CHAT_REFRESH_TOKEN_TTL_SEC", u64, 3600);
            let rotate_refresh_tokens = optional_env_parse!("CHAT_ROTATE_REFRESH_TOKENS", bool, false);

            Self::new(
                access_token_secret,
                refresh_token_secret,
                Duration::from_secs(ttl_secs),
                rotate_refresh_tokens,
            )
        }

        /// Validates secrets and clamps the refresh lifetime.
        pub fn new(
            access_token_secret: String,
            refresh_token_secret: String,
            refresh_token_ttl: Duration,
            rotate_refresh_tokens: bool,
        ) -> Result<Self> {
            // ---
            if access_token_secret.is_empty() || refresh_token_secret.is_empty() {
                anyhow::bail!("Token secrets must not be empty");
            }
            if access_token_secret == refresh_token_secret {
                anyhow::bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
            }

            Ok(Self {
                access_token_secret,
                refresh_token_secret,
                refresh_token_ttl: refresh_token_ttl.clamp(MIN_REFRESH_TTL, MAX_REFRESH_TTL),
                rotate_refresh_tokens,
            })
        }
    }

    impl fmt::Debug for AuthConfig {
        // ---
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("AuthConfig")
                .field("access_token_secret", &"<redacted>")
                .field("refresh_token_secret", &"<redacted>")
                .field("refresh_token_ttl", &self.refresh_token_ttl)
                .field("rotate_refresh_tokens", &self.rotate_refresh_tokens)
                .finish()
        }
    }
}
pub use auth::AuthConfig;

// ============================================================
// Cookie configuration
// ============================================================

mod cookie {
    // ---
    use super::*;

    /// Attributes of the refresh token cookie.
    #[derive(Debug, Clone)]
    pub struct CookieConfig {
        /// `true`: `Secure; SameSite=None` (cross-site HTTPS deployments).
        /// `false`: `SameSite=Lax` without `Secure` (plain-HTTP local development).
        pub secure: bool,

        /// Optional `Domain` attribute.
        pub domain: Option<String>,
    }

    impl CookieConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let secure = optional_env_parse!("CHAT_COOKIE_SECURE", bool, true);
            let domain = std::env::var("CHAT_COOKIE_DOMAIN")
                .ok()
                .filter(|d| !d.is_empty());

            Ok(Self { secure, domain })
        }
    }
}
pub use cookie::CookieConfig;

// ============================================================
// Metrics configuration
// ============================================================

mod metrics {
    // ---
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MetricsType {
        Noop,
        Prom,
    }

    impl MetricsType {
        /// Reads `CHAT_METRICS_TYPE`; anything other than `prom` means no-op.
        pub fn from_env() -> Result<Self> {
            // ---
            let kind = std::env::var("CHAT_METRICS_TYPE").unwrap_or_else(|_| "noop".to_string());
            Ok(if kind == "prom" { Self::Prom } else { Self::Noop })
        }
    }
}
pub use metrics::MetricsType;

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use anyhow::Result;
    use serial_test::serial;

    fn set_secrets() {
        // ---
        std::env::set_var("ACCESS_TOKEN_SECRET", "access-secret");
        std::env::set_var("REFRESH_TOKEN_SECRET", "refresh-secret");
    }

    #[test]
    #[serial]
    fn missing_database_url_fails() -> Result<()> {
        // ---
        std::env::remove_var("DATABASE_URL");

        assert_missing_config!(database::DatabaseConfig::from_env(), "DATABASE_URL");

        Ok(())
    }

    #[test]
    #[serial]
    fn database_defaults_applied() -> Result<()> {
        // ---
        let db_url = "postgres://test";
        std::env::set_var("DATABASE_URL", db_url); // required

        std::env::remove_var("CHAT_DB_RETRY_COUNT");
        std::env::remove_var("CHAT_DB_ACQUIRE_TIMEOUT_SEC");
        std::env::remove_var("CHAT_DB_MIN_CONNECTIONS");
        std::env::remove_var("CHAT_DB_MAX_CONNECTIONS");

        let cfg = database::DatabaseConfig::from_env()?;
        assert_eq!(cfg.database_url, db_url);
        assert_eq!(cfg.retry_count, 50);
        assert_eq!(cfg.acquire_timeout.as_secs(), 30);
        assert_eq!(cfg.min_connections, 2);
        assert_eq!(cfg.max_connections, 15);

        Ok(())
    }

    #[test]
    #[serial]
    fn database_overrides_defaults() -> Result<()> {
        // ---
        let db_url = "postgres://test";
        std::env::set_var("DATABASE_URL", db_url);
        std::env::set_var("CHAT_DB_RETRY_COUNT", "3");
        std::env::set_var("CHAT_DB_ACQUIRE_TIMEOUT_SEC", "5");
        std::env::set_var("CHAT_DB_MIN_CONNECTIONS", "10");
        std::env::set_var("CHAT_DB_MAX_CONNECTIONS", "1000");

        let cfg = database::DatabaseConfig::from_env()?;
        assert_eq!(cfg.retry_count, 3);
        assert_eq!(cfg.acquire_timeout.as_secs(), 5);
        assert_eq!(cfg.database_url, db_url);
        assert_eq!(cfg.min_connections, 10);
        assert_eq!(cfg.max_connections, 1000);

        for key in [
            "CHAT_DB_RETRY_COUNT",
            "CHAT_DB_ACQUIRE_TIMEOUT_SEC",
            "CHAT_DB_MIN_CONNECTIONS",
            "CHAT_DB_MAX_CONNECTIONS",
        ] {
            std::env::remove_var(key);
        }

        Ok(())
    }

    #[test]
    #[serial]
    fn missing_secret_fails() -> Result<()> {
        // ---
        set_secrets();
        std::env::remove_var("REFRESH_TOKEN_SECRET");

        assert_missing_config!(auth::AuthConfig::from_env(), "REFRESH_TOKEN_SECRET");

        Ok(())
    }

    #[test]
    #[serial]
    fn identical_secrets_are_rejected() -> Result<()> {
        // ---
        std::env::set_var("ACCESS_TOKEN_SECRET", "same");
        std::env::set_var("REFRESH_TOKEN_SECRET", "same");

        let err = auth::AuthConfig::from_env().expect_err("expected configuration error");
        assert!(err.to_string().contains("must differ"));

        Ok(())
    }

    #[test]
    #[serial]
    fn refresh_ttl_defaults_and_clamps() -> Result<()> {
        // ---
        set_secrets();
        std::env::remove_var("CHAT_REFRESH_TOKEN_TTL_SEC");
        std::env::remove_var("CHAT_ROTATE_REFRESH_TOKENS");

        let cfg = auth::AuthConfig::from_env()?;
        assert_eq!(cfg.refresh_token_ttl.as_secs(), 3600);
        assert!(!cfg.rotate_refresh_tokens);

        std::env::set_var("CHAT_REFRESH_TOKEN_TTL_SEC", "60");
        assert_eq!(auth::AuthConfig::from_env()?.refresh_token_ttl.as_secs(), 3600);

        std::env::set_var("CHAT_REFRESH_TOKEN_TTL_SEC", "604800");
        assert_eq!(auth::AuthConfig::from_env()?.refresh_token_ttl.as_secs(), 86_400);

        std::env::set_var("CHAT_REFRESH_TOKEN_TTL_SEC", "7200");
        std::env::set_var("CHAT_ROTATE_REFRESH_TOKENS", "true");
        let cfg = auth::AuthConfig::from_env()?;
        assert_eq!(cfg.refresh_token_ttl.as_secs(), 7200);
        assert!(cfg.rotate_refresh_tokens);

        std::env::remove_var("CHAT_REFRESH_TOKEN_TTL_SEC");
        std::env::remove_var("CHAT_ROTATE_REFRESH_TOKENS");

        Ok(())
    }

    #[test]
    fn auth_config_debug_hides_secrets() -> Result<()> {
        // ---
        let cfg = AuthConfig::new(
            "top-secret-a".into(),
            "top-secret-b".into(),
            Duration::from_secs(3600),
            false,
        )?;
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("top-secret"));

        Ok(())
    }

    #[test]
    #[serial]
    fn cookie_defaults_to_secure() -> Result<()> {
        // ---
        std::env::remove_var("CHAT_COOKIE_SECURE");
        std::env::remove_var("CHAT_COOKIE_DOMAIN");

        let cfg = cookie::CookieConfig::from_env()?;
        assert!(cfg.secure);
        assert!(cfg.domain.is_none());

        Ok(())
    }

    #[test]
    #[serial]
    fn unknown_storage_type_fails() -> Result<()> {
        // ---
        std::env::set_var("CHAT_STORAGE_TYPE", "sqlite");
        assert!(storage::StorageConfig::from_env().is_err());
        std::env::remove_var("CHAT_STORAGE_TYPE");

        Ok(())
    }

    #[test]
    #[serial]
    fn app_config_from_env_success() -> Result<()> {
        // ---
        set_secrets();
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("CHAT_REDIS_URL", "redis://localhost");
        std::env::remove_var("CHAT_STORAGE_TYPE");
        std::env::remove_var("CHAT_BIND_ADDR");
        std::env::remove_var("CHAT_METRICS_TYPE");

        let cfg = AppConfig::from_env()?;
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:8080");
        assert!(matches!(cfg.storage, StorageConfig::Postgres { .. }));
        assert_eq!(cfg.metrics, MetricsType::Noop);

        Ok(())
    }

    #[test]
    #[serial]
    fn memory_storage_needs_no_database() -> Result<()> {
        // ---
        set_secrets();
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("CHAT_REDIS_URL");
        std::env::set_var("CHAT_STORAGE_TYPE", "memory");

        let cfg = AppConfig::from_env()?;
        assert!(matches!(cfg.storage, StorageConfig::Memory));

        std::env::remove_var("CHAT_STORAGE_TYPE");

        Ok(())
    }

    #[test]
    #[serial]
    fn proxy_headers_are_untrusted_unless_enabled() -> Result<()> {
        // ---
        std::env::remove_var("CHAT_TRUST_PROXY_HEADERS");
        assert!(!server::ServerConfig::from_env()?.trust_proxy_headers);

        std::env::set_var("CHAT_TRUST_PROXY_HEADERS", "true");
        assert!(server::ServerConfig::from_env()?.trust_proxy_headers);

        std::env::remove_var("CHAT_TRUST_PROXY_HEADERS");
        Ok(())
    }
}
