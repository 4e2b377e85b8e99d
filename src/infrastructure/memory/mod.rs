// src/infrastructure/memory/mod.rs
mod memory_repository;
mod memory_session_store;

pub use memory_repository::MemoryRepository;
pub use memory_session_store::MemorySessionStore;

use crate::domain::{RepositoryPtr, SessionStorePtr};
use std::sync::Arc;

/// Creates an empty in-memory repository.
///
/// Used with `CHAT_STORAGE_TYPE=memory` and throughout the test suite.
pub fn create_memory_repository() -> RepositoryPtr {
    Arc::new(MemoryRepository::new())
}

/// Creates an empty in-memory session store.
pub fn create_memory_session_store() -> SessionStorePtr {
    Arc::new(MemorySessionStore::new())
}
