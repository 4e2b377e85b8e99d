use super::models::Session;
use anyhow::Result;
use std::sync::Arc;

/// Abstraction for session record persistence.
///
/// Implementations only need per-key read-committed consistency; nothing
/// spans more than one session id.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    // ---
    async fn create_session(&self, session: &Session) -> Result<()>;

    async fn find_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Returns whether a record was removed. Removing a session that does
    /// not exist is not an error.
    async fn delete_session(&self, session_id: &str) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}

pub type SessionStorePtr = Arc<dyn SessionStore>;
