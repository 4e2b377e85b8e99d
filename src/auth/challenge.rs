//! Single-use login challenges.
//!
//! A challenge is 32 random bytes, hex-encoded, that the client signs with
//! its private key. Each identity holds at most one live challenge and
//! answering it consumes it, so a captured signature cannot be replayed.

use crate::domain::AuthError;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How long a client has to answer a challenge.
pub const CHALLENGE_TTL: Duration = Duration::from_secs(120);

/// Number of random bytes in a challenge (256 bits).
const CHALLENGE_BYTES: usize = 32;

#[derive(Debug, Clone)]
struct Challenge {
    value: String,
    expires_at: Instant,
}

/// Process-wide store of outstanding challenges, keyed by username.
///
/// Constructed once at startup and shared through `AppState`. Every access
/// goes through a single mutex; nothing is persisted, so a restart simply
/// forces clients to ask again.
pub struct NonceChallengeStore {
    challenges: Mutex<HashMap<String, Challenge>>,
    ttl: Duration,
}

impl NonceChallengeStore {
    // ---
    pub fn new() -> Self {
        // ---
        Self::with_ttl(CHALLENGE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        // ---
        NonceChallengeStore {
            challenges: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issues a fresh challenge for `identity`, replacing any unanswered one.
    pub fn issue(&self, identity: &str) -> String {
        // ---
        let mut bytes = [0u8; CHALLENGE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let value = hex::encode(bytes);

        let challenge = Challenge {
            value: value.clone(),
            expires_at: Instant::now() + self.ttl,
        };

        if self.lock().insert(identity.to_string(), challenge).is_some() {
            tracing::debug!("Replaced unanswered challenge for '{}'", identity);
        }

        value
    }

    /// Takes the challenge for `identity`. It is gone afterwards either way.
    pub fn consume(&self, identity: &str) -> Result<String, AuthError> {
        // ---
        self.consume_at(identity, Instant::now())
    }

    pub(crate) fn consume_at(&self, identity: &str, now: Instant) -> Result<String, AuthError> {
        // ---
        let challenge = self
            .lock()
            .remove(identity)
            .ok_or(AuthError::NoChallenge)?;

        if now > challenge.expires_at {
            return Err(AuthError::ChallengeExpired);
        }

        Ok(challenge.value)
    }

    /// Drops every expired challenge and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        // ---
        self.purge_expired_at(Instant::now())
    }

    pub(crate) fn purge_expired_at(&self, now: Instant) -> usize {
        // ---
        let mut challenges = self.lock();
        let before = challenges.len();
        challenges.retain(|_, c| now <= c.expires_at);
        before - challenges.len()
    }

    /// Number of outstanding challenges.
    pub fn len(&self) -> usize {
        // ---
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        // ---
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Challenge>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.challenges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NonceChallengeStore {
    fn default() -> Self {
        Self::new()
    }
}
