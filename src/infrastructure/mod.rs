mod database;
mod memory;
pub mod metrics;
mod redis;

// Re-export the factory functions for easy access
pub use database::{connect_with_retry, create_postgres_repository, run_migrations};
pub use memory::{create_memory_repository, create_memory_session_store};
pub use metrics::{create_noop_metrics, create_prom_metrics};
pub use self::redis::create_redis_session_store;
