use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    message_sort_key, ChatMessage, FriendSummary, Friendship, NewMessage, PublicKey, Repository,
    RepositoryPtr, Signature, StoreError, User,
};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    public_key_x: String,
    public_key_y: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            public_key: PublicKey {
                x: r.public_key_x,
                y: r.public_key_y,
            },
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    sender: String,
    receiver: String,
    ciphertext: String,
    message_hash: String,
    signature_r: String,
    signature_s: String,
    sent_at: String,
}

impl From<MessageRow> for ChatMessage {
    fn from(r: MessageRow) -> Self {
        ChatMessage {
            id: r.id.to_string(),
            sender: r.sender,
            receiver: r.receiver,
            ciphertext: r.ciphertext,
            message_hash: r.message_hash,
            signature: Signature {
                r: r.signature_r,
                s: r.signature_s,
            },
            timestamp: r.sent_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FriendRow {
    username: String,
    public_key_x: String,
    public_key_y: String,
}

pub fn create_postgres_repository(pool: PgPool) -> RepositoryPtr {
    // ---
    Arc::new(PostgresRepository::new(pool))
}

pub struct PostgresRepository {
    // ---
    pool: PgPool,
}

impl PostgresRepository {
    // ---
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }
}

/// Maps a unique-key violation to `Conflict`, anything else to `Backend`.
fn conflict_or_backend(e: sqlx::Error, what: String) -> StoreError {
    // ---
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what),
        _ => StoreError::Backend(e.into()),
    }
}

#[async_trait::async_trait]
impl Repository for PostgresRepository {
    // ---
    async fn create_user(&self, username: &str, public_key: &PublicKey) -> Result<User, StoreError> {
        // ---
        let user = User::new(username.to_string(), public_key.clone());

        sqlx::query(
            "INSERT INTO users (id, username, public_key_x, public_key_y, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.public_key.x)
        .bind(&user.public_key.y)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_backend(e, format!("username '{username}'")))?;

        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        // ---
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, public_key_x, public_key_y, created_at
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        // ---
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, public_key_x, public_key_y, created_at
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn append_message(&self, message: &NewMessage) -> Result<String> {
        // ---
        let sort_at = message_sort_key(&message.timestamp, Utc::now());

        let id: Option<i64> = sqlx::query_scalar(
            "INSERT INTO messages
                 (sender_id, receiver_id, ciphertext, message_hash,
                  signature_r, signature_s, sent_at, sort_at)
             SELECT s.id, r.id, $3, $4, $5, $6, $7, $8
             FROM users s, users r
             WHERE s.username = $1 AND r.username = $2
             RETURNING id",
        )
        .bind(&message.sender)
        .bind(&message.receiver)
        .bind(&message.ciphertext)
        .bind(&message.message_hash)
        .bind(&message.signature.r)
        .bind(&message.signature.s)
        .bind(&message.timestamp)
        .bind(sort_at)
        .fetch_optional(&self.pool)
        .await?;

        id.map(|id| id.to_string()).ok_or_else(|| {
            anyhow!(
                "unknown sender '{}' or receiver '{}'",
                message.sender,
                message.receiver
            )
        })
    }

    async fn list_messages(&self, a: &str, b: &str) -> Result<Vec<ChatMessage>> {
        // ---
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT m.id, s.username AS sender, r.username AS receiver,
                    m.ciphertext, m.message_hash, m.signature_r, m.signature_s, m.sent_at
             FROM messages m
             JOIN users s ON s.id = m.sender_id
             JOIN users r ON r.id = m.receiver_id
             WHERE (s.username = $1 AND r.username = $2)
                OR (s.username = $2 AND r.username = $1)
             ORDER BY m.sort_at, m.id",
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    async fn add_friend(
        &self,
        username: &str,
        friend_username: &str,
    ) -> Result<Friendship, StoreError> {
        // ---
        let user = self
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user '{username}'")))?;
        let friend = self
            .get_user_by_username(friend_username)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user '{friend_username}'")))?;

        let created_at = Utc::now();

        // Both directions in one statement, so the edge is never half-written.
        sqlx::query(
            "INSERT INTO friendships (user_id, friend_id, created_at)
             VALUES ($1, $2, $3), ($2, $1, $3)",
        )
        .bind(user.id)
        .bind(friend.id)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_or_backend(e, format!("friendship '{username}' <-> '{friend_username}'"))
        })?;

        Ok(Friendship {
            username: user.username,
            friend_username: friend.username,
            created_at,
        })
    }

    async fn list_friends(&self, username: &str) -> Result<Vec<FriendSummary>> {
        // ---
        let rows = sqlx::query_as::<_, FriendRow>(
            "SELECT u.username, u.public_key_x, u.public_key_y
             FROM friendships f
             JOIN users me ON me.id = f.user_id
             JOIN users u ON u.id = f.friend_id
             WHERE me.username = $1
             ORDER BY u.username",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| FriendSummary {
                username: r.username,
                public_key: PublicKey {
                    x: r.public_key_x,
                    y: r.public_key_y,
                },
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        // ---
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
