use anyhow::Result;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::{Session, SessionStore};

/// Session records held in process memory, keyed by session id.
///
/// Records are not expired here; `SessionManager` checks `expires_at` on
/// every load and drops stale entries it finds.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    // ---
    async fn create_session(&self, session: &Session) -> Result<()> {
        // ---
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<Session>> {
        // ---
        Ok(self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned())
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        // ---
        Ok(self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
