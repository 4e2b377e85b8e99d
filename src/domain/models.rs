use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public half of a user's P-256 key pair, as hex-encoded affine coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    // ---
    pub x: String,
    pub y: String,
}

/// ECDSA signature scalars, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    // ---
    pub r: String,
    pub s: String,
}

/// A registered chat identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    // ---
    pub id: Uuid,
    pub username: String,
    pub public_key: PublicKey,
    pub created_at: DateTime<Utc>,
}

impl User {
    // ---
    pub fn new(username: String, public_key: PublicKey) -> Self {
        // ---
        Self {
            id: Uuid::new_v4(),
            username,
            public_key,
            created_at: Utc::now(),
        }
    }
}

/// Server-side record backing one refresh token (one per login / device).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    // ---
    pub session_id: String,
    pub user_id: Uuid,

    /// PHC-formatted Argon2id hash; never the raw refresh token.
    pub refresh_token_hash: String,

    pub expires_at: DateTime<Utc>,
    pub user_agent: String,
    pub client_ip: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    // ---
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        // ---
        now > self.expires_at
    }
}

/// A chat message accepted by the relay but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    // ---
    pub sender: String,
    pub receiver: String,
    pub ciphertext: String,
    pub message_hash: String,
    pub signature: Signature,

    /// Sender-supplied ISO-8601 timestamp, stored verbatim.
    pub timestamp: String,
}

/// A persisted chat message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    // ---
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub ciphertext: String,
    pub message_hash: String,
    pub signature: Signature,
    pub timestamp: String,
}

impl ChatMessage {
    // ---
    pub fn from_new(id: String, message: NewMessage) -> Self {
        // ---
        Self {
            id,
            sender: message.sender,
            receiver: message.receiver,
            ciphertext: message.ciphertext,
            message_hash: message.message_hash,
            signature: message.signature,
            timestamp: message.timestamp,
        }
    }
}

/// Ordering key for message history.
///
/// Sender timestamps that parse as RFC 3339 are used as given; anything else
/// falls back to the server's receive time.
pub fn message_sort_key(timestamp: &str, received_at: DateTime<Utc>) -> DateTime<Utc> {
    // ---
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(received_at)
}

/// One direction of a friendship edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friendship {
    // ---
    pub username: String,
    pub friend_username: String,
    pub created_at: DateTime<Utc>,
}

/// A friend as shown in a user's contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendSummary {
    // ---
    pub username: String,
    pub public_key: PublicKey,
}
