//! Channel repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Channel;

/// Repository trait for channels known to the worker
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    /// Insert or update a channel, keeping its original `created_at`
    async fn upsert(&self, channel: &Channel) -> DomainResult<()>;

    /// Channel by id, active or not
    async fn find(&self, id: &str) -> DomainResult<Option<Channel>>;

    /// Active channels the bot is a member of
    async fn list_active(&self) -> DomainResult<Vec<Channel>>;

    /// Mark every channel whose id is not in `keep_ids` inactive.
    /// Returns the number of channels deactivated.
    async fn deactivate_missing(&self, keep_ids: &[String]) -> DomainResult<u64>;
}
