mod errors;
mod metrics;
mod models;
mod repository;
mod session_store;

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr};

// Publicly expose storage abstractions
pub use repository::{Repository, RepositoryPtr};
pub use session_store::{SessionStore, SessionStorePtr};

pub use errors::{AuthError, RelayError, SessionError, StoreError, TokenError, TokenInvalidReason};
pub use models::{
    message_sort_key, ChatMessage, FriendSummary, Friendship, NewMessage, PublicKey, Session,
    Signature, User,
};
