//! Session management for authenticated users.
//!
//! Every successful login creates one server-side session record bound to
//! the refresh token handed to the client. Only a salted Argon2id hash of
//! that token is stored, so a leaked session store cannot be replayed.

use crate::auth::{RefreshClaims, TokenCodec};
use crate::domain::{Session, SessionError, SessionStorePtr};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha3::{Digest, Sha3_256};
use std::sync::Arc;
use uuid::Uuid;

// ---

/// Tokens and identifiers produced by a successful login or rotation.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    //
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

// ---

pub struct SessionManager {
    store: SessionStorePtr,
    tokens: Arc<TokenCodec>,
    rotate_refresh_tokens: bool,
}

impl SessionManager {
    // ---
    pub fn new(store: SessionStorePtr, tokens: Arc<TokenCodec>, rotate_refresh_tokens: bool) -> Self {
        // ---
        SessionManager {
            store,
            tokens,
            rotate_refresh_tokens,
        }
    }

    /// Whether a refresh should replace the presented session with a new one.
    pub fn rotates_refresh_tokens(&self) -> bool {
        // ---
        self.rotate_refresh_tokens
    }

    pub fn store(&self) -> &SessionStorePtr {
        // ---
        &self.store
    }

    /// Creates and persists a session, then mints the token pair for it.
    ///
    /// # Arguments
    /// * `user_id` - Authenticated user's id
    /// * `username` - Authenticated user's name
    /// * `user_agent` - Client `User-Agent`, informational only
    /// * `client_ip` - Client address, informational only
    pub async fn create(
        &self,
        user_id: Uuid,
        username: &str,
        user_agent: &str,
        client_ip: &str,
    ) -> Result<IssuedSession, SessionError> {
        //
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + chrono::Duration::seconds(self.tokens.refresh_ttl().as_secs() as i64);

        let refresh_token = self
            .tokens
            .mint_refresh_at(&session_id, username, now.timestamp())?;
        let refresh_token_hash = hash_blocking(refresh_token.clone()).await?;

        let session = Session {
            session_id: session_id.clone(),
            user_id,
            refresh_token_hash,
            expires_at,
            user_agent: user_agent.to_string(),
            client_ip: client_ip.to_string(),
            created_at: now,
        };
        self.store.create_session(&session).await?;

        let access_token = self.tokens.mint_access(user_id, username)?;

        tracing::info!("Created session {} for user: {}", session_id, username);

        Ok(IssuedSession {
            session_id,
            access_token,
            refresh_token,
            expires_at,
        })
    }

    /// Verifies a presented refresh token and loads the session it names.
    ///
    /// The token signature and expiry are checked first, then the session
    /// record must exist, be unexpired, and hold a hash matching the token.
    pub async fn verify_and_load(
        &self,
        refresh_token: &str,
    ) -> Result<(RefreshClaims, Session), SessionError> {
        //
        let claims = self.tokens.verify_refresh(refresh_token)?;

        let session = self
            .store
            .find_session(&claims.sid)
            .await?
            .ok_or(SessionError::SessionNotFound)?;

        if session.is_expired_at(Utc::now()) {
            if let Err(e) = self.store.delete_session(&session.session_id).await {
                tracing::warn!("Failed to drop expired session {}: {}", session.session_id, e);
            }
            return Err(SessionError::SessionExpired);
        }

        let matches = verify_blocking(refresh_token.to_string(), session.refresh_token_hash.clone()).await?;
        if !matches {
            return Err(SessionError::TokenMismatch);
        }

        Ok((claims, session))
    }

    /// Deletes the session record. Revoking twice is not an error.
    pub async fn revoke(&self, session: &Session) -> Result<(), SessionError> {
        //
        self.store.delete_session(&session.session_id).await?;
        tracing::info!("Revoked session {}", session.session_id);
        Ok(())
    }

    /// Mints a fresh access token for a verified refresh.
    pub fn mint_access_for(
        &self,
        claims: &RefreshClaims,
        session: &Session,
    ) -> Result<String, SessionError> {
        //
        Ok(self.tokens.mint_access(session.user_id, &claims.username)?)
    }

    /// Replaces a verified session with a brand new one.
    ///
    /// Only the caller whose delete actually removed the old record gets a
    /// new session; a concurrent rotation of the same token fails with
    /// `SessionNotFound`.
    pub async fn rotate(
        &self,
        claims: &RefreshClaims,
        session: &Session,
        user_agent: &str,
        client_ip: &str,
    ) -> Result<IssuedSession, SessionError> {
        //
        if !self.store.delete_session(&session.session_id).await? {
            tracing::warn!("Session {} was already rotated or revoked", session.session_id);
            return Err(SessionError::SessionNotFound);
        }
        self.create(session.user_id, &claims.username, user_agent, client_ip)
            .await
    }
}

// ---

/// SHA3-256 pre-hash, hex-encoded, so Argon2 always sees a fixed-size input.
fn prehash(refresh_token: &str) -> String {
    // ---
    hex::encode(Sha3_256::digest(refresh_token.as_bytes()))
}

fn hash_refresh_token(refresh_token: &str) -> Result<String, SessionError> {
    // ---
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| SessionError::Hashing(e.to_string()))?;

    Argon2::default()
        .hash_password(prehash(refresh_token).as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SessionError::Hashing(e.to_string()))
}

fn refresh_token_matches(refresh_token: &str, stored_hash: &str) -> Result<bool, SessionError> {
    // ---
    let parsed = PasswordHash::new(stored_hash).map_err(|e| SessionError::Hashing(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(prehash(refresh_token).as_bytes(), &parsed)
        .is_ok())
}

async fn hash_blocking(refresh_token: String) -> Result<String, SessionError> {
    // ---
    tokio::task::spawn_blocking(move || hash_refresh_token(&refresh_token))
        .await
        .map_err(|e| SessionError::Hashing(e.to_string()))?
}

async fn verify_blocking(refresh_token: String, stored_hash: String) -> Result<bool, SessionError> {
    // ---
    tokio::task::spawn_blocking(move || refresh_token_matches(&refresh_token, &stored_hash))
        .await
        .map_err(|e| SessionError::Hashing(e.to_string()))?
}
