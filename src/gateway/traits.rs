//! Pluggable gateway seams — response generation is external to this core.

use anyhow::Result;
use async_trait::async_trait;

use crate::sessions::Session;

/// Produces the assistant reply for one conversation turn.
///
/// Implemented by the orchestration layer; maitre only gates access and
/// stores the transcript. Always called with no store lock held.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Generate a reply given the session so far and the latest user
    /// message.
    async fn respond(&self, session: &Session, message: &str) -> Result<String>;

    /// The name of this responder implementation.
    fn name(&self) -> &str;
}
