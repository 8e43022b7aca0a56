//! Channel memory repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Memory;

/// Repository trait for per-channel memory summaries
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Summary for a channel, if one has been generated
    async fn find(&self, channel_id: &str) -> DomainResult<Option<Memory>>;

    /// Insert or replace a channel's summary
    async fn upsert(&self, memory: &Memory) -> DomainResult<()>;
}
