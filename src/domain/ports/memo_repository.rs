//! Memo repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Memo;

/// Repository trait for free-form memos
#[async_trait]
pub trait MemoRepository: Send + Sync {
    /// Insert or replace a memo by id
    async fn upsert(&self, memo: &Memo) -> DomainResult<()>;

    /// Memos for a channel plus workspace-wide memos (no channel).
    /// With `None`, every memo.
    async fn list(&self, channel_id: Option<&str>) -> DomainResult<Vec<Memo>>;

    /// Returns true if a memo was deleted
    async fn delete(&self, id: Uuid) -> DomainResult<bool>;
}
