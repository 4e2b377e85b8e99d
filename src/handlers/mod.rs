// Gateway module - controls public API for handlers
// Modules are private, only exported symbols are public

mod auth;
mod chat;
mod extractors;
mod health;
mod metrics;
mod root;
mod shared_types;
mod users;

// Core handlers
pub use health::health_check;
pub use metrics::{metrics_handler, track_http_metrics};
pub use root::root_handler;

// Authentication handlers
pub use auth::{login, logout, nonce, refresh, register, REFRESH_COOKIE};

// Protected user handlers
pub use users::{add_friend, list_friends, me, public_key};

// Chat handlers
pub use chat::{chat_socket, history};
