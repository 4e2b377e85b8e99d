//! Directory of connected identities and their delivery queues.
//!
//! Each live connection owns a bounded queue drained by its writer task. The
//! registry maps an identity to the sending half of that queue; at most one
//! entry exists per identity and the most recent connection wins.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

/// Capacity of each connection's outbound queue.
pub const CHANNEL_CAPACITY: usize = 64;

/// A serialized frame queued for one connection.
///
/// The text is shared so one serialization can be queued to both parties.
#[derive(Debug, Clone)]
pub struct RegistryMessage {
    // ---
    pub text: Arc<str>,
}

impl RegistryMessage {
    // ---
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        // ---
        RegistryMessage { text: text.into() }
    }
}

pub type ConnectionSender = mpsc::Sender<RegistryMessage>;
pub type ConnectionReceiver = mpsc::Receiver<RegistryMessage>;

/// Creates the bounded queue for a new connection.
pub fn connection_channel() -> (ConnectionSender, ConnectionReceiver) {
    // ---
    mpsc::channel(CHANNEL_CAPACITY)
}

/// Thread-safe registry of connected clients.
///
/// Mutations take the write lock; sends only need the read lock, so
/// deliveries to different identities never wait on each other.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, ConnectionSender>>,
}

impl ConnectionRegistry {
    // ---
    pub fn new() -> Self {
        // ---
        ConnectionRegistry {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `channel` as the delivery queue for `identity`.
    ///
    /// Returns `true` if an earlier connection was displaced. The displaced
    /// queue is dropped from the registry but not closed; its connection
    /// keeps running until its own socket ends.
    pub fn register(&self, identity: &str, channel: ConnectionSender) -> bool {
        // ---
        let displaced = self
            .write()
            .insert(identity.to_string(), channel)
            .is_some();

        if displaced {
            tracing::info!("'{}' connected elsewhere; previous connection displaced", identity);
        }
        displaced
    }

    /// Removes the entry for `identity`, but only if it still belongs to
    /// `channel`. A stale connection closing never evicts its replacement.
    pub fn unregister(&self, identity: &str, channel: &ConnectionSender) -> bool {
        // ---
        let mut connections = self.write();
        match connections.get(identity) {
            Some(current) if current.same_channel(channel) => {
                connections.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Queues `message` for `identity` without waiting.
    ///
    /// Returns `false` when the identity is offline or its queue is closed
    /// or full.
    pub fn send(&self, identity: &str, message: RegistryMessage) -> bool {
        // ---
        match self.read().get(identity) {
            Some(tx) => tx.try_send(message).is_ok(),
            None => false,
        }
    }

    pub fn is_connected(&self, identity: &str) -> bool {
        // ---
        self.read().contains_key(identity)
    }

    /// Returns the number of currently connected clients.
    pub fn connected_count(&self) -> usize {
        // ---
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ConnectionSender>> {
        self.connections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ConnectionSender>> {
        self.connections.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
