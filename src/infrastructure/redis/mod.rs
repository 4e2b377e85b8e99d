//! Redis-backed session store.
//!
//! Each session lives under `session:{id}` as JSON, with a Redis TTL matching
//! the session's own expiry so abandoned sessions clean themselves up.

use crate::domain::{Session, SessionStore, SessionStorePtr};
use anyhow::{Context, Result};
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::sync::Arc;

// ---

pub fn create_redis_session_store(client: Client) -> SessionStorePtr {
    // ---
    Arc::new(RedisSessionStore::new(client))
}

pub struct RedisSessionStore {
    client: Client,
}

impl RedisSessionStore {
    // ---
    pub fn new(client: Client) -> Self {
        // ---
        RedisSessionStore { client }
    }

    /// Opens a multiplexed connection for one operation.
    async fn conn(&self) -> Result<MultiplexedConnection> {
        // ---
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")
    }
}

fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    // ---
    async fn create_session(&self, session: &Session) -> Result<()> {
        //
        let session_json =
            serde_json::to_string(session).context("Failed to serialize session data")?;

        let ttl_secs = (session.expires_at - Utc::now()).num_seconds().max(1) as u64;

        self.conn()
            .await?
            .set_ex::<_, _, ()>(session_key(&session.session_id), session_json, ttl_secs)
            .await
            .context("Failed to store session in Redis")?;

        Ok(())
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<Session>> {
        //
        let raw: Option<String> = self
            .conn()
            .await?
            .get(session_key(session_id))
            .await
            .context("Failed to read session from Redis")?;

        raw.map(|json| serde_json::from_str(&json).context("Corrupt session record in Redis"))
            .transpose()
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        //
        let removed: u64 = self
            .conn()
            .await?
            .del(session_key(session_id))
            .await
            .context("Failed to delete session from Redis")?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<()> {
        //
        let _: String = redis::cmd("PING")
            .query_async(&mut self.conn().await?)
            .await
            .context("Redis PING failed")?;
        Ok(())
    }
}
