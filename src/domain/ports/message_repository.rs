//! Message repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Message, Scope};

/// Repository trait for stored chat messages
///
/// Messages are keyed by `(channel_id, ts)`. Timestamps are platform strings
/// that sort numerically.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert or replace a message
    async fn upsert(&self, message: &Message) -> DomainResult<()>;

    /// Newest message in a scope (top level when `thread_ts` is `None`)
    async fn latest_in_scope(&self, scope: &Scope) -> DomainResult<Option<Message>>;

    /// Messages of a channel (all scopes) newer than `after_ts`, oldest first
    async fn list_since(
        &self,
        channel_id: &str,
        after_ts: Option<&str>,
        limit: u32,
    ) -> DomainResult<Vec<Message>>;

    /// Scopes of a channel that have a message newer than `since_ts`,
    /// most recently active first
    async fn active_scopes(&self, channel_id: &str, since_ts: &str, limit: u32) -> DomainResult<Vec<Scope>>;
}
