//! In-process messaging and LLM collaborators for tests and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ChannelInfo, Judgment, Message};
use crate::domain::ports::{Generation, LlmClient, MessagingClient, Usage};

/// A message posted through [`MockMessagingClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Target channel.
    pub channel_id: String,
    /// Message body.
    pub text: String,
    /// Thread the reply went to, if any.
    pub thread_ts: Option<String>,
    /// Timestamp returned to the caller.
    pub ts: String,
}

type HistoryKey = (String, Option<String>);

/// Messaging client backed by in-memory fixtures.
#[derive(Default)]
pub struct MockMessagingClient {
    channels: RwLock<Vec<ChannelInfo>>,
    histories: RwLock<HashMap<HistoryKey, Vec<Message>>>,
    sent: RwLock<Vec<SentMessage>>,
    failure: RwLock<Option<String>>,
    next_ts: AtomicU64,
}

impl MockMessagingClient {
    /// Client with no channels and no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Channels returned by `list_channels`.
    pub async fn set_channels(&self, channels: Vec<ChannelInfo>) {
        *self.channels.write().await = channels;
    }

    /// History returned for a channel (`thread_ts = None`) or a thread, oldest first.
    pub async fn set_history(&self, channel_id: &str, thread_ts: Option<&str>, messages: Vec<Message>) {
        self.histories
            .write()
            .await
            .insert((channel_id.to_string(), thread_ts.map(str::to_string)), messages);
    }

    /// Make every call fail with a messaging error until cleared.
    pub async fn fail_with(&self, error: Option<&str>) {
        *self.failure.write().await = error.map(str::to_string);
    }

    /// Every message sent so far, in order.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().await.clone()
    }

    async fn check_failure(&self) -> DomainResult<()> {
        match self.failure.read().await.as_ref() {
            Some(error) => Err(DomainError::Messaging(error.clone())),
            None => Ok(()),
        }
    }

    async fn history(&self, key: HistoryKey, limit: u32) -> Vec<Message> {
        let histories = self.histories.read().await;
        let messages = histories.get(&key).cloned().unwrap_or_default();
        let skip = messages.len().saturating_sub(limit as usize);
        messages.into_iter().skip(skip).collect()
    }
}

#[async_trait]
impl MessagingClient for MockMessagingClient {
    async fn send_message(&self, channel_id: &str, text: &str, thread_ts: Option<&str>) -> DomainResult<String> {
        self.check_failure().await?;
        let seq = self.next_ts.fetch_add(1, Ordering::SeqCst) + 1;
        let ts = format!("9000000000.{seq:06}");
        self.sent.write().await.push(SentMessage {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            thread_ts: thread_ts.map(str::to_string),
            ts: ts.clone(),
        });
        Ok(ts)
    }

    async fn fetch_channel_history(&self, channel_id: &str, limit: u32) -> DomainResult<Vec<Message>> {
        self.check_failure().await?;
        Ok(self.history((channel_id.to_string(), None), limit).await)
    }

    async fn fetch_thread_history(&self, channel_id: &str, thread_ts: &str, limit: u32) -> DomainResult<Vec<Message>> {
        self.check_failure().await?;
        Ok(self
            .history((channel_id.to_string(), Some(thread_ts.to_string())), limit)
            .await)
    }

    async fn list_channels(&self) -> DomainResult<Vec<ChannelInfo>> {
        self.check_failure().await?;
        Ok(self.channels.read().await.clone())
    }
}

/// LLM client returning canned judgments and replies.
pub struct MockLlmClient {
    judgment: RwLock<Judgment>,
    reply: RwLock<String>,
    failure: RwLock<Option<String>>,
    prompts: RwLock<Vec<String>>,
    judge_calls: AtomicU32,
    generate_calls: AtomicU32,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self {
            judgment: RwLock::new(Judgment::new(false, "nothing to add", 0.95)),
            reply: RwLock::new("Happy to help.".to_string()),
            failure: RwLock::new(None),
            prompts: RwLock::new(Vec::new()),
            judge_calls: AtomicU32::new(0),
            generate_calls: AtomicU32::new(0),
        }
    }
}

impl MockLlmClient {
    /// Client that declines to respond with high confidence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `judge` call with `judgment`.
    pub fn with_judgment(self, judgment: Judgment) -> Self {
        Self {
            judgment: RwLock::new(judgment),
            ..self
        }
    }

    /// Answer every `generate` call with `reply`.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        Self {
            reply: RwLock::new(reply.into()),
            ..self
        }
    }

    /// Change the judgment returned from now on.
    pub async fn set_judgment(&self, judgment: Judgment) {
        *self.judgment.write().await = judgment;
    }

    /// Change the generated reply from now on.
    pub async fn set_reply(&self, reply: impl Into<String>) {
        *self.reply.write().await = reply.into();
    }

    /// Make every call fail with `error`, or succeed again with `None`.
    pub async fn fail_with(&self, error: Option<&str>) {
        *self.failure.write().await = error.map(str::to_string);
    }

    /// Number of `judge` calls so far.
    pub fn judge_count(&self) -> u32 {
        self.judge_calls.load(Ordering::SeqCst)
    }

    /// Number of `generate` calls so far.
    pub fn generate_count(&self) -> u32 {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Every generate prompt received, in call order.
    pub async fn generate_prompts(&self) -> Vec<String> {
        self.prompts.read().await.clone()
    }

    async fn check_failure(&self) -> DomainResult<()> {
        match self.failure.read().await.as_ref() {
            Some(error) => Err(DomainError::Llm(error.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn judge(&self, _context: &str, _message: &Message) -> DomainResult<Judgment> {
        self.judge_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure().await?;
        Ok(self.judgment.read().await.clone())
    }

    async fn generate(&self, context: &str) -> DomainResult<Generation> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure().await?;
        self.prompts.write().await.push(context.to_string());
        let text = self.reply.read().await.clone();
        Ok(Generation {
            usage: Usage {
                input_tokens: context.len() as u64 / 4,
                output_tokens: text.len() as u64 / 4,
            },
            text,
        })
    }
}
