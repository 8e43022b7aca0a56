//! Chat platform port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ChannelInfo, Message};

/// Chat platform operations used by the worker.
///
/// Implementations talk to the actual platform (see `adapters::slack`); the
/// scheduling core only relies on this contract.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Post `text` into a channel, or into a thread when `thread_ts` is set.
    ///
    /// Returns the platform timestamp of the posted message.
    async fn send_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> DomainResult<String>;

    /// Most recent top-level messages of a channel, oldest first.
    async fn fetch_channel_history(&self, channel_id: &str, limit: u32) -> DomainResult<Vec<Message>>;

    /// Most recent messages of one thread (parent included), oldest first.
    async fn fetch_thread_history(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
    ) -> DomainResult<Vec<Message>>;

    /// All channels visible to the bot.
    async fn list_channels(&self) -> DomainResult<Vec<ChannelInfo>>;
}
