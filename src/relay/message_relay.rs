//! Realtime relay of encrypted chat frames.
//!
//! Each connection runs one read loop. A text frame is parsed, persisted,
//! and only then forwarded to the sender's and receiver's live connections.
//! Per-frame failures are logged and the frame is dropped; the connection
//! itself only ends when the socket does.

use super::frame::ChatFrame;
use super::registry::{connection_channel, ConnectionRegistry, RegistryMessage};
use crate::domain::{ChatMessage, MetricsPtr, NewMessage, RelayError, RepositoryPtr};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where a forwarded message was queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    // ---
    pub to_sender: bool,
    pub to_receiver: bool,
}

pub struct MessageRelay {
    repository: RepositoryPtr,
    registry: Arc<ConnectionRegistry>,
    metrics: MetricsPtr,
}

impl MessageRelay {
    // ---
    pub fn new(repository: RepositoryPtr, registry: Arc<ConnectionRegistry>, metrics: MetricsPtr) -> Self {
        // ---
        MessageRelay {
            repository,
            registry,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        // ---
        &self.registry
    }

    /// Drives one authenticated WebSocket until it closes.
    ///
    /// Registers the connection, spawns its writer task, and reads frames
    /// sequentially. On exit the registry entry is removed only if it still
    /// belongs to this connection.
    pub async fn run_connection(self: Arc<Self>, socket: WebSocket, identity: String) {
        // ---
        let (tx, mut rx) = connection_channel();
        self.registry.register(&identity, tx.clone());
        self.metrics
            .record_open_connections(self.registry.connected_count());
        info!("WebSocket connection established for '{}'", identity);

        let (mut sink, mut stream) = socket.split();

        let mut writer = tokio::spawn(async move {
            while let Some(outbound) = rx.recv().await {
                if sink
                    .send(Message::Text(outbound.text.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        self.handle_text(&identity, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Read failed for '{}': {}", identity, e);
                        break;
                    }
                },
                _ = &mut writer => {
                    debug!("Writer for '{}' stopped", identity);
                    break;
                }
            }
        }

        self.registry.unregister(&identity, &tx);
        writer.abort();
        self.metrics
            .record_open_connections(self.registry.connected_count());
        info!("WebSocket connection closed for '{}'", identity);
    }

    /// Handles one inbound text frame from `identity`.
    ///
    /// Returns `None` when the frame was dropped.
    pub async fn handle_text(&self, identity: &str, text: &str) -> Option<Delivery> {
        // ---
        let message = match ChatFrame::parse_inbound(text, identity) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping frame from '{}': {}", identity, e);
                self.metrics.record_message_dropped(drop_reason(&e));
                return None;
            }
        };

        let saved = match self.persist(message).await {
            Ok(saved) => saved,
            Err(e) => {
                error!("Dropping frame from '{}': {}", identity, e);
                self.metrics.record_message_dropped(drop_reason(&e));
                return None;
            }
        };

        Some(self.forward(&saved))
    }

    /// Appends the message to storage and returns it with its assigned id.
    pub async fn persist(&self, message: NewMessage) -> Result<ChatMessage, RelayError> {
        // ---
        let id = self
            .repository
            .append_message(&message)
            .await
            .map_err(RelayError::PersistFailed)?;

        Ok(ChatMessage::from_new(id, message))
    }

    /// Queues a persisted message to the sender (echo for other devices and
    /// for the id) and to the receiver. Offline parties are skipped.
    pub fn forward(&self, message: &ChatMessage) -> Delivery {
        // ---
        let text = match serde_json::to_string(&ChatFrame::from(message)) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize message {}: {}", message.id, e);
                return Delivery {
                    to_sender: false,
                    to_receiver: false,
                };
            }
        };
        let outbound = RegistryMessage::new(text);

        let to_sender = self.deliver(&message.sender, outbound.clone());
        let to_receiver = if message.receiver == message.sender {
            to_sender
        } else {
            self.deliver(&message.receiver, outbound)
        };

        self.metrics.record_message_relayed(to_receiver);
        Delivery {
            to_sender,
            to_receiver,
        }
    }

    fn deliver(&self, identity: &str, outbound: RegistryMessage) -> bool {
        // ---
        if self.registry.send(identity, outbound) {
            return true;
        }

        // Still registered means the queue is full or closing; the frame is
        // in history either way.
        if self.registry.is_connected(identity) {
            warn!("Queue for '{}' is full or closed; frame not forwarded", identity);
        } else {
            debug!("{}", RelayError::PeerOffline(identity.to_string()));
        }
        false
    }
}

fn drop_reason(error: &RelayError) -> &'static str {
    // ---
    match error {
        RelayError::MalformedFrame(_) => "malformed",
        RelayError::SenderMismatch { .. } => "sender_mismatch",
        RelayError::PeerOffline(_) => "peer_offline",
        RelayError::PersistFailed(_) => "persist_failed",
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::{PublicKey, Repository};
    use crate::infrastructure::{create_memory_repository, create_noop_metrics};
    use serde_json::json;

    async fn relay_with_users() -> (MessageRelay, RepositoryPtr) {
        // ---
        let repository = create_memory_repository();
        let key = PublicKey {
            x: "01".to_string(),
            y: "02".to_string(),
        };
        repository.create_user("alice", &key).await.unwrap();
        repository.create_user("bob", &key).await.unwrap();

        let relay = MessageRelay::new(
            repository.clone(),
            Arc::new(ConnectionRegistry::new()),
            create_noop_metrics().unwrap(),
        );
        (relay, repository)
    }

    fn frame(sender: &str, receiver: &str, timestamp: &str) -> String {
        // ---
        json!({
            "sender_username": sender,
            "receiver_username": receiver,
            "encrypted_message": "ciphertext",
            "message_hash": "hash",
            "signature": { "r": "aa", "s": "bb" },
            "timestamp": timestamp
        })
        .to_string()
    }

    #[tokio::test]
    async fn delivers_to_online_receiver_and_echoes_to_sender() {
        // ---
        let (relay, _) = relay_with_users().await;
        let (alice_tx, mut alice_rx) = connection_channel();
        let (bob_tx, mut bob_rx) = connection_channel();
        relay.registry().register("alice", alice_tx);
        relay.registry().register("bob", bob_tx);

        let delivery = relay
            .handle_text("alice", &frame("alice", "bob", "2025-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert!(delivery.to_sender && delivery.to_receiver);

        let to_bob: serde_json::Value =
            serde_json::from_str(&bob_rx.recv().await.unwrap().text).unwrap();
        let to_alice: serde_json::Value =
            serde_json::from_str(&alice_rx.recv().await.unwrap().text).unwrap();

        assert_eq!(to_bob, to_alice);
        assert_eq!(to_bob["encrypted_message"], "ciphertext");
        assert_eq!(to_bob["signature"]["r"], "aa");
        assert!(to_bob["id"].is_string());
    }

    #[tokio::test]
    async fn offline_receiver_still_gets_history() {
        // ---
        let (relay, repository) = relay_with_users().await;

        let delivery = relay
            .handle_text("alice", &frame("alice", "bob", "2025-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert!(!delivery.to_receiver);

        let history = repository.list_messages("alice", "bob").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].ciphertext, "ciphertext");
    }

    #[tokio::test]
    async fn malformed_and_spoofed_frames_are_dropped() {
        // ---
        let (relay, repository) = relay_with_users().await;

        assert!(relay.handle_text("alice", "not json").await.is_none());
        assert!(relay
            .handle_text("alice", &frame("bob", "alice", "2025-01-01T00:00:00Z"))
            .await
            .is_none());

        assert!(repository.list_messages("alice", "bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_receiver_fails_to_persist() {
        // ---
        let (relay, _) = relay_with_users().await;
        let (alice_tx, mut alice_rx) = connection_channel();
        relay.registry().register("alice", alice_tx);

        assert!(relay
            .handle_text("alice", &frame("alice", "nobody", "2025-01-01T00:00:00Z"))
            .await
            .is_none());
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_skips_forwarding_but_keeps_receiver_registered() {
        // ---
        let (relay, repository) = relay_with_users().await;
        let (bob_tx, mut bob_rx) = tokio::sync::mpsc::channel(1);
        relay.registry().register("bob", bob_tx);

        let first = relay
            .handle_text("alice", &frame("alice", "bob", "2025-01-01T00:00:00Z"))
            .await
            .unwrap();
        let second = relay
            .handle_text("alice", &frame("alice", "bob", "2025-01-01T00:00:01Z"))
            .await
            .unwrap();

        assert!(first.to_receiver);
        assert!(!second.to_receiver);
        assert!(relay.registry().is_connected("bob"));
        assert_eq!(repository.list_messages("alice", "bob").await.unwrap().len(), 2);

        assert!(bob_rx.recv().await.is_some());
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn persist_then_forward_preserves_frame_order() {
        // ---
        let (relay, _) = relay_with_users().await;
        let (bob_tx, mut bob_rx) = connection_channel();
        relay.registry().register("bob", bob_tx);

        for i in 0..5 {
            let ts = format!("2025-01-01T00:00:0{i}Z");
            relay.handle_text("alice", &frame("alice", "bob", &ts)).await;
        }

        for i in 0..5 {
            let received: serde_json::Value =
                serde_json::from_str(&bob_rx.recv().await.unwrap().text).unwrap();
            assert_eq!(received["timestamp"], format!("2025-01-01T00:00:0{i}Z"));
        }
    }
}
