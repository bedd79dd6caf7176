//! Session storage traits and types for conversation state.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::identity::ClientIdentity;

/// Who authored a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

/// A single message in a conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }
}

/// A tracked conversation session. Records are exclusively owned by the
/// store; callers only ever see clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner: ClientIdentity,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

/// One row in a session listing.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: usize,
    pub last_message: Option<DateTime<Utc>>,
}

/// Capacity, quota, and expiry limits enforced by a session store.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Maximum live sessions across all clients.
    pub max_sessions_total: usize,
    /// Maximum live sessions owned by a single client identity.
    pub max_sessions_per_client: usize,
    /// Maximum messages retained per session.
    pub max_messages_per_session: usize,
    /// Age past which a record is treated as absent on every read.
    pub session_ttl: Duration,
}

/// Why a new session or message was refused admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// The store already holds its configured maximum of sessions.
    #[error("session store is full ({limit} sessions)")]
    OverGlobalCapacity { limit: usize },

    /// The owning client already holds its maximum of sessions.
    #[error("client {identity} is at its session quota ({limit})")]
    OverPerIdentityQuota {
        identity: ClientIdentity,
        limit: usize,
    },

    /// The session already holds its maximum number of messages. The caller
    /// may summarize or compact the conversation and retry.
    #[error("session {session_id} is full ({limit} messages)")]
    SessionMessageLimitExceeded { session_id: String, limit: usize },
}

/// Errors surfaced by session store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionStoreError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    /// The id does not exist, or the record aged past its TTL.
    #[error("unknown or expired session {session_id}")]
    UnknownOrExpired { session_id: String },
}

/// Bounded, expiring storage for conversation sessions.
///
/// Implementations enforce the global, per-client, and per-session limits
/// atomically with the mutating operation, and treat records older than the
/// TTL as absent on every read; expiry never waits for a sweep.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return the live session for `id`, creating it if absent.
    ///
    /// Idempotent: an existing live record is returned as-is and is never
    /// re-counted against any quota. A fresh create is admission-checked
    /// against the global capacity and the owner's quota in the same
    /// critical section as the insert; rejection has no side effects.
    async fn get_or_create(
        &self,
        id: &str,
        identity: &ClientIdentity,
    ) -> Result<Session, AdmissionError>;

    /// Append a message to a live session.
    ///
    /// Rejects (never truncates) once the per-session cap is reached; the
    /// record is left unchanged on rejection.
    async fn append_message(&self, id: &str, message: Message) -> Result<(), SessionStoreError>;

    /// Get a live session by id. Expired records behave as absent.
    async fn get(&self, id: &str) -> Result<Session, SessionStoreError>;

    /// Delete a session outright. Returns whether a record was removed.
    async fn remove(&self, id: &str) -> bool;

    /// Summaries of all live sessions.
    async fn list(&self) -> Vec<SessionSummary>;

    /// Snapshot the ids of records currently past their TTL. Taken under
    /// the store lock but consumed outside it.
    async fn expired_ids(&self) -> Vec<String>;

    /// Remove `id` only if it is still past its TTL, re-checked under the
    /// store lock. Returns whether a record was removed.
    async fn remove_if_expired(&self, id: &str) -> bool;

    /// Number of records held, expired-but-unswept included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The name of this session store implementation.
    fn name(&self) -> &str;
}
