//! Shared fixtures for service tests: migrated in-memory SQLite plus mock
//! messaging and LLM collaborators.

use std::sync::Arc;

use chrono::Utc;

use crate::adapters::mock::{MockLlmClient, MockMessagingClient};
use crate::adapters::sqlite::{create_migrated_test_pool, sqlite_repositories};
use crate::domain::models::{Channel, ChannelInfo, Message};
use crate::domain::ports::Repositories;

pub const BOT_USER_ID: &str = "UBOT";

pub struct Fixture {
    pub repos: Repositories,
    pub messaging: Arc<MockMessagingClient>,
    pub llm: Arc<MockLlmClient>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_llm(MockLlmClient::new()).await
    }

    pub async fn with_llm(llm: MockLlmClient) -> Self {
        let pool = create_migrated_test_pool().await.unwrap();
        Self {
            repos: sqlite_repositories(&pool),
            messaging: Arc::new(MockMessagingClient::new()),
            llm: Arc::new(llm),
        }
    }

    pub async fn add_channel(&self, id: &str) {
        let channel = Channel::from_info(&ChannelInfo {
            id: id.to_string(),
            name: format!("{id}-name"),
            is_member: true,
        });
        self.repos.channels.upsert(&channel).await.unwrap();
    }

    /// Store a message and return it.
    pub async fn post(&self, channel: &str, ts: &str, thread_ts: Option<&str>, user: &str, text: &str) -> Message {
        let message = Message {
            channel_id: channel.to_string(),
            ts: ts.to_string(),
            thread_ts: thread_ts.map(str::to_string),
            user_id: user.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.repos.messages.upsert(&message).await.unwrap();
        message
    }
}

/// A platform timestamp `offset_secs` from now.
pub fn ts_from_now(offset_secs: i64) -> String {
    crate::domain::models::message_ts_at(Utc::now() + chrono::Duration::seconds(offset_secs))
}
