//! Realtime message relay over WebSocket.

mod frame;
mod message_relay;
mod registry;

pub use frame::ChatFrame;
pub use message_relay::{Delivery, MessageRelay};
pub use registry::{
    connection_channel, ConnectionRegistry, ConnectionSender, RegistryMessage, CHANNEL_CAPACITY,
};
