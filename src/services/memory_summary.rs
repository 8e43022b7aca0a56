//! Channel memory summarization use case.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Channel, Config, Memory};
use crate::domain::ports::{LlmClient, Repositories};
use crate::services::periodic_loop::PeriodicTask;
use crate::services::prompts;

/// Most new messages folded into one summary update.
const MAX_MESSAGES_PER_SUMMARY: u32 = 200;

/// Tuning for [`MemorySummaryService`].
#[derive(Debug, Clone)]
pub struct MemorySummaryConfig {
    /// Channels with fewer new messages than this are left alone.
    pub min_new_messages: u32,
}

impl MemorySummaryConfig {
    /// Derive from the `agent` section of the config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_new_messages: config.agent.summary_min_messages.max(1),
        }
    }
}

/// Summary of one summarization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    /// Active channels inspected.
    pub channels_checked: usize,
    /// Channels whose memory was rewritten.
    pub summaries_written: usize,
    /// Channels that failed and were skipped.
    pub failures: usize,
}

/// Keeps each channel's memory summary up to date.
///
/// Passes never overlap, so the timer event and the background generator
/// cannot summarize the same messages twice.
pub struct MemorySummaryService {
    repos: Repositories,
    llm: Arc<dyn LlmClient>,
    config: MemorySummaryConfig,
    running: Mutex<()>,
}

impl MemorySummaryService {
    /// Summarizer over `repos`, generating with `llm`.
    pub fn new(repos: Repositories, llm: Arc<dyn LlmClient>, config: MemorySummaryConfig) -> Self {
        Self {
            repos,
            llm,
            config,
            running: Mutex::new(()),
        }
    }

    /// Refresh the memory of every active channel with enough new traffic.
    pub async fn run_once(&self) -> DomainResult<SummaryReport> {
        let _pass = self.running.lock().await;
        let mut report = SummaryReport::default();
        for channel in self.repos.channels.list_active().await? {
            report.channels_checked += 1;
            match self.summarize_channel(&channel).await {
                Ok(true) => report.summaries_written += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::error!(channel_id = %channel.id, error = %e, "memory summary failed");
                }
            }
        }

        tracing::info!(
            channels_checked = report.channels_checked,
            summaries_written = report.summaries_written,
            failures = report.failures,
            "memory summary finished"
        );
        Ok(report)
    }

    /// Returns true if a new summary was written.
    async fn summarize_channel(&self, channel: &Channel) -> DomainResult<bool> {
        let existing = self.repos.memories.find(&channel.id).await?;
        let after_ts = existing.as_ref().and_then(|m| m.last_message_ts.as_deref());
        let fresh = self
            .repos
            .messages
            .list_since(&channel.id, after_ts, MAX_MESSAGES_PER_SUMMARY)
            .await?;

        if fresh.len() < self.config.min_new_messages as usize {
            tracing::debug!(
                channel_id = %channel.id,
                new_messages = fresh.len(),
                "not enough new messages to summarize"
            );
            return Ok(false);
        }

        let prompt = prompts::summary_prompt(&channel.id, existing.as_ref().map(|m| m.content.as_str()), &fresh);
        let generation = self.llm.generate(&prompt).await?;

        let mut memory = existing.unwrap_or_else(|| Memory::new(channel.id.clone(), ""));
        memory.content = generation.text.trim().to_string();
        memory.message_count += fresh.len() as u64;
        memory.last_message_ts = fresh.last().map(|m| m.ts.clone()).or(memory.last_message_ts);
        memory.updated_at = Utc::now();
        self.repos.memories.upsert(&memory).await?;

        tracing::info!(
            channel_id = %channel.id,
            new_messages = fresh.len(),
            total_messages = memory.message_count,
            "channel memory updated"
        );
        Ok(true)
    }
}

#[async_trait]
impl PeriodicTask for MemorySummaryService {
    fn name(&self) -> &str {
        "memory-summary"
    }

    async fn run_once(&self) -> DomainResult<()> {
        MemorySummaryService::run_once(self).await.map(|_| ())
    }
}
