use super::errors::StoreError;
use super::models::{ChatMessage, FriendSummary, Friendship, NewMessage, PublicKey, User};
use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

/// Abstraction for identity, message and friendship persistence.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    // ---
    /// Create a new user. Fails with `StoreError::Conflict` if the username is taken.
    async fn create_user(&self, username: &str, public_key: &PublicKey) -> Result<User, StoreError>;

    /// Get user by username.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by ID.
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Append a message between two existing users and return its id.
    async fn append_message(&self, message: &NewMessage) -> Result<String>;

    /// All messages exchanged between `a` and `b`, ascending by timestamp.
    async fn list_messages(&self, a: &str, b: &str) -> Result<Vec<ChatMessage>>;

    /// Record a symmetric friendship.
    async fn add_friend(&self, username: &str, friend_username: &str)
        -> Result<Friendship, StoreError>;

    /// Friends of `username`, ordered by username.
    async fn list_friends(&self, username: &str) -> Result<Vec<FriendSummary>>;

    /// Cheap liveness check used by the full health endpoint.
    async fn ping(&self) -> Result<()>;
}

/// Type alias for any backend that implements Repository.
pub type RepositoryPtr = Arc<dyn Repository>;
