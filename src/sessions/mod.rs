//! Session management — bounded, expiring storage for conversation state.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemorySessionStore;
pub use traits::{
    AdmissionError, Message, MessageRole, Session, SessionLimits, SessionStore, SessionStoreError,
    SessionSummary,
};

use std::sync::Arc;

/// Create the default in-memory session store.
pub fn create_session_store(limits: SessionLimits) -> Arc<dyn SessionStore> {
    Arc::new(InMemorySessionStore::new(limits))
}
