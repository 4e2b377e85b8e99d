use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::domain::{
    message_sort_key, ChatMessage, FriendSummary, Friendship, NewMessage, PublicKey, Repository,
    StoreError, User,
};

struct StoredMessage {
    message: ChatMessage,
    sort_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    /// Insertion order; ties on `sort_at` keep it.
    messages: Vec<StoredMessage>,
    next_message_id: u64,
    /// username -> (friend username -> since)
    friends: HashMap<String, BTreeMap<String, DateTime<Utc>>>,
}

/// Process-local repository for development and tests. Nothing survives a
/// restart.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    // ---
    async fn create_user(&self, username: &str, public_key: &PublicKey) -> Result<User, StoreError> {
        // ---
        let mut state = self.write();
        if state.users.contains_key(username) {
            return Err(StoreError::Conflict(format!("username '{username}'")));
        }

        let user = User::new(username.to_string(), public_key.clone());
        state.users.insert(username.to_string(), user.clone());
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        // ---
        Ok(self.read().users.get(username).cloned())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        // ---
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.id == user_id)
            .cloned())
    }

    async fn append_message(&self, message: &NewMessage) -> Result<String> {
        // ---
        let mut state = self.write();
        if !state.users.contains_key(&message.sender) || !state.users.contains_key(&message.receiver) {
            return Err(anyhow!(
                "unknown sender '{}' or receiver '{}'",
                message.sender,
                message.receiver
            ));
        }

        state.next_message_id += 1;
        let id = state.next_message_id.to_string();
        let sort_at = message_sort_key(&message.timestamp, Utc::now());

        state.messages.push(StoredMessage {
            message: ChatMessage::from_new(id.clone(), message.clone()),
            sort_at,
        });
        Ok(id)
    }

    async fn list_messages(&self, a: &str, b: &str) -> Result<Vec<ChatMessage>> {
        // ---
        let state = self.read();
        let mut conversation: Vec<&StoredMessage> = state
            .messages
            .iter()
            .filter(|m| {
                (m.message.sender == a && m.message.receiver == b)
                    || (m.message.sender == b && m.message.receiver == a)
            })
            .collect();

        // Stable sort, so equal keys stay in insertion order.
        conversation.sort_by_key(|m| m.sort_at);

        Ok(conversation.into_iter().map(|m| m.message.clone()).collect())
    }

    async fn add_friend(
        &self,
        username: &str,
        friend_username: &str,
    ) -> Result<Friendship, StoreError> {
        // ---
        let mut state = self.write();
        for name in [username, friend_username] {
            if !state.users.contains_key(name) {
                return Err(StoreError::NotFound(format!("user '{name}'")));
            }
        }

        let already = state
            .friends
            .get(username)
            .is_some_and(|f| f.contains_key(friend_username));
        if already {
            return Err(StoreError::Conflict(format!(
                "friendship '{username}' <-> '{friend_username}'"
            )));
        }

        let created_at = Utc::now();
        state
            .friends
            .entry(username.to_string())
            .or_default()
            .insert(friend_username.to_string(), created_at);
        state
            .friends
            .entry(friend_username.to_string())
            .or_default()
            .insert(username.to_string(), created_at);

        Ok(Friendship {
            username: username.to_string(),
            friend_username: friend_username.to_string(),
            created_at,
        })
    }

    async fn list_friends(&self, username: &str) -> Result<Vec<FriendSummary>> {
        // ---
        let state = self.read();
        let Some(friends) = state.friends.get(username) else {
            return Ok(Vec::new());
        };

        Ok(friends
            .keys()
            .filter_map(|name| state.users.get(name))
            .map(|u| FriendSummary {
                username: u.username.clone(),
                public_key: u.public_key.clone(),
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
