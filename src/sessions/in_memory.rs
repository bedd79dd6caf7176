//! In-memory session store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::traits::{
    AdmissionError, Message, Session, SessionLimits, SessionStore, SessionStoreError,
    SessionSummary,
};
use crate::identity::ClientIdentity;

/// Map state guarded by a single mutex: the session map, the per-owner
/// index, and (implicitly) the total count move together, so every
/// check-then-act sequence is one critical section.
#[derive(Default)]
struct StoreInner {
    sessions: HashMap<String, Session>,
    by_owner: HashMap<ClientIdentity, HashSet<String>>,
}

impl StoreInner {
    /// Drop a record and its owner-index entry. The index is a
    /// back-reference, never an ownership edge; it must never outlive the
    /// record it points at.
    fn purge(&mut self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some(session) => {
                if let Some(owned) = self.by_owner.get_mut(&session.owner) {
                    owned.remove(id);
                    if owned.is_empty() {
                        self.by_owner.remove(&session.owner);
                    }
                }
                true
            }
            None => false,
        }
    }
}

/// Bounded, expiring session store backed by a mutex-protected hash map.
///
/// Admission policy is deny-on-full: a create that would exceed the global
/// capacity or the owner's quota is rejected; live sessions are never
/// evicted to make room.
pub struct InMemorySessionStore {
    limits: SessionLimits,
    inner: Mutex<StoreInner>,
}

impl InMemorySessionStore {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    fn expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(session.created_at) > self.limits.session_ttl
    }

    fn get_or_create_at(
        &self,
        id: &str,
        identity: &ClientIdentity,
        now: DateTime<Utc>,
    ) -> Result<Session, AdmissionError> {
        let mut inner = self.inner.lock();

        // Aged-out records that are not yet swept free their id and fall
        // through to a fresh, fully admission-checked create.
        let purge_expired = match inner.sessions.get(id) {
            Some(existing) if !self.expired(existing, now) => return Ok(existing.clone()),
            Some(_) => true,
            None => false,
        };
        if purge_expired {
            inner.purge(id);
        }

        if inner.sessions.len() >= self.limits.max_sessions_total {
            return Err(AdmissionError::OverGlobalCapacity {
                limit: self.limits.max_sessions_total,
            });
        }
        let owned = inner.by_owner.get(identity).map_or(0, HashSet::len);
        if owned >= self.limits.max_sessions_per_client {
            return Err(AdmissionError::OverPerIdentityQuota {
                identity: identity.clone(),
                limit: self.limits.max_sessions_per_client,
            });
        }

        let session = Session {
            id: id.to_string(),
            owner: identity.clone(),
            created_at: now,
            last_active_at: now,
            messages: Vec::new(),
        };
        inner.sessions.insert(id.to_string(), session.clone());
        inner
            .by_owner
            .entry(identity.clone())
            .or_default()
            .insert(id.to_string());
        Ok(session)
    }

    fn append_message_at(
        &self,
        id: &str,
        message: Message,
        now: DateTime<Utc>,
    ) -> Result<(), SessionStoreError> {
        let mut inner = self.inner.lock();

        let live = match inner.sessions.get(id) {
            Some(session) => !self.expired(session, now),
            None => false,
        };
        if !live {
            return Err(SessionStoreError::UnknownOrExpired {
                session_id: id.to_string(),
            });
        }

        if let Some(session) = inner.sessions.get_mut(id) {
            if session.messages.len() >= self.limits.max_messages_per_session {
                return Err(AdmissionError::SessionMessageLimitExceeded {
                    session_id: id.to_string(),
                    limit: self.limits.max_messages_per_session,
                }
                .into());
            }
            session.messages.push(message);
            session.last_active_at = now;
        }
        Ok(())
    }

    fn get_at(&self, id: &str, now: DateTime<Utc>) -> Result<Session, SessionStoreError> {
        let inner = self.inner.lock();
        match inner.sessions.get(id) {
            Some(session) if !self.expired(session, now) => Ok(session.clone()),
            _ => Err(SessionStoreError::UnknownOrExpired {
                session_id: id.to_string(),
            }),
        }
    }

    fn list_at(&self, now: DateTime<Utc>) -> Vec<SessionSummary> {
        let inner = self.inner.lock();
        let mut summaries: Vec<SessionSummary> = inner
            .sessions
            .values()
            .filter(|s| !self.expired(s, now))
            .map(|s| SessionSummary {
                session_id: s.id.clone(),
                message_count: s.messages.len(),
                last_message: s.messages.last().map(|m| m.timestamp),
            })
            .collect();
        summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        summaries
    }

    fn expired_ids_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .sessions
            .values()
            .filter(|s| self.expired(s, now))
            .map(|s| s.id.clone())
            .collect()
    }

    fn remove_if_expired_at(&self, id: &str, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock();
        // The id may have been removed and recreated since the sweep
        // snapshot was taken; only a record still past its TTL is dropped.
        let still_expired = match inner.sessions.get(id) {
            Some(session) => self.expired(session, now),
            None => false,
        };
        still_expired && inner.purge(id)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(
        &self,
        id: &str,
        identity: &ClientIdentity,
    ) -> Result<Session, AdmissionError> {
        self.get_or_create_at(id, identity, Utc::now())
    }

    async fn append_message(&self, id: &str, message: Message) -> Result<(), SessionStoreError> {
        self.append_message_at(id, message, Utc::now())
    }

    async fn get(&self, id: &str) -> Result<Session, SessionStoreError> {
        self.get_at(id, Utc::now())
    }

    async fn remove(&self, id: &str) -> bool {
        self.inner.lock().purge(id)
    }

    async fn list(&self) -> Vec<SessionSummary> {
        self.list_at(Utc::now())
    }

    async fn expired_ids(&self) -> Vec<String> {
        self.expired_ids_at(Utc::now())
    }

    async fn remove_if_expired(&self, id: &str) -> bool {
        self.remove_if_expired_at(id, Utc::now())
    }

    fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
