//! Common test utilities for integration tests
//!
//! Shared fixtures: a migrated in-memory database, mock collaborators, and
//! polling helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use autoreply::adapters::mock::{MockLlmClient, MockMessagingClient};
use autoreply::adapters::sqlite::{create_migrated_test_pool, sqlite_repositories};
use autoreply::domain::models::{message_ts_at, Channel, ChannelInfo, IncomingMessage};
use autoreply::domain::ports::Repositories;

pub const BOT_USER_ID: &str = "UBOT";

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Poll `predicate` every 10ms until it holds or `timeout_ms` passes.
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

pub struct TestEnv {
    pub pool: sqlx::SqlitePool,
    pub repos: Repositories,
    pub messaging: Arc<MockMessagingClient>,
    pub llm: Arc<MockLlmClient>,
}

impl TestEnv {
    pub async fn new(llm: MockLlmClient) -> Self {
        let pool = create_migrated_test_pool().await.expect("migrated test pool");
        Self {
            repos: sqlite_repositories(&pool),
            pool,
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
        self.repos.channels.upsert(&channel).await.expect("channel upsert");
    }
}

/// A platform timestamp `offset_secs` from now.
pub fn ts_from_now(offset_secs: i64) -> String {
    message_ts_at(Utc::now() + chrono::Duration::seconds(offset_secs))
}

pub fn incoming(channel_id: &str, thread_ts: Option<&str>, user_id: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        channel_id: channel_id.to_string(),
        ts: ts_from_now(0),
        thread_ts: thread_ts.map(str::to_string),
        user_id: user_id.to_string(),
        user_name: None,
        text: text.to_string(),
    }
}
