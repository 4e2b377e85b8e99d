//! JSON frame exchanged over the chat WebSocket, in both directions.

use crate::domain::{ChatMessage, NewMessage, RelayError, Signature};
use serde::{Deserialize, Serialize};

/// Wire shape of a chat message.
///
/// `id` is assigned by the server on persist and only appears on outbound
/// frames; any `id` a client sends is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub sender_username: String,
    pub receiver_username: String,
    pub encrypted_message: String,
    pub message_hash: String,
    pub signature: Signature,
    pub timestamp: String,
}

impl ChatFrame {
    // ---
    /// Parses an inbound frame sent on `identity`'s connection.
    ///
    /// The frame must name `identity` as its sender and carry a receiver and
    /// a ciphertext; anything else is a malformed frame.
    pub fn parse_inbound(text: &str, identity: &str) -> Result<NewMessage, RelayError> {
        // ---
        let frame: ChatFrame =
            serde_json::from_str(text).map_err(|e| RelayError::MalformedFrame(e.to_string()))?;

        if frame.sender_username != identity {
            return Err(RelayError::SenderMismatch {
                claimed: frame.sender_username,
                actual: identity.to_string(),
            });
        }
        if frame.receiver_username.is_empty() {
            return Err(RelayError::MalformedFrame("missing receiver".to_string()));
        }
        if frame.encrypted_message.is_empty() {
            return Err(RelayError::MalformedFrame("empty message".to_string()));
        }

        Ok(NewMessage {
            sender: frame.sender_username,
            receiver: frame.receiver_username,
            ciphertext: frame.encrypted_message,
            message_hash: frame.message_hash,
            signature: frame.signature,
            timestamp: frame.timestamp,
        })
    }
}

impl From<&ChatMessage> for ChatFrame {
    // ---
    fn from(message: &ChatMessage) -> Self {
        // ---
        ChatFrame {
            id: Some(message.id.clone()),
            sender_username: message.sender.clone(),
            receiver_username: message.receiver.clone(),
            encrypted_message: message.ciphertext.clone(),
            message_hash: message.message_hash.clone(),
            signature: message.signature.clone(),
            timestamp: message.timestamp.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn inbound(sender: &str) -> String {
        // ---
        json!({
            "sender_username": sender,
            "receiver_username": "bob",
            "encrypted_message": "Y2lwaGVy",
            "message_hash": "abcd",
            "signature": { "r": "01", "s": "02" },
            "timestamp": "2025-01-01T00:00:00Z"
        })
        .to_string()
    }

    #[test]
    fn parses_frame_from_its_own_sender() {
        // ---
        let message = ChatFrame::parse_inbound(&inbound("alice"), "alice").unwrap();
        assert_eq!(message.sender, "alice");
        assert_eq!(message.receiver, "bob");
        assert_eq!(message.ciphertext, "Y2lwaGVy");
        assert_eq!(message.signature.r, "01");
        assert_eq!(message.timestamp, "2025-01-01T00:00:00Z");
    }

    #[test]
    fn rejects_spoofed_sender() {
        // ---
        assert!(matches!(
            ChatFrame::parse_inbound(&inbound("mallory"), "alice"),
            Err(RelayError::SenderMismatch { .. })
        ));
    }

    #[test]
    fn rejects_non_json_and_missing_fields() {
        // ---
        assert!(matches!(
            ChatFrame::parse_inbound("hello", "alice"),
            Err(RelayError::MalformedFrame(_))
        ));
        assert!(matches!(
            ChatFrame::parse_inbound(r#"{"sender_username":"alice"}"#, "alice"),
            Err(RelayError::MalformedFrame(_))
        ));
    }

    #[test]
    fn outbound_frame_carries_id() {
        // ---
        let message = ChatMessage {
            id: "42".to_string(),
            sender: "alice".to_string(),
            receiver: "bob".to_string(),
            ciphertext: "c".to_string(),
            message_hash: "h".to_string(),
            signature: Signature {
                r: "1".to_string(),
                s: "2".to_string(),
            },
            timestamp: "t".to_string(),
        };

        let value = serde_json::to_value(ChatFrame::from(&message)).unwrap();
        assert_eq!(value["id"], "42");
        assert_eq!(value["encrypted_message"], "c");
        assert_eq!(value["signature"]["s"], "2");
    }
}
