//! Autonomous response use case.
//!
//! For every recently active conversation scope, decide whether the agent
//! should speak. A cached judgment short-circuits the decision call until its
//! skip window elapses or a new message lands in the scope.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::domain::errors::DomainResult;
use crate::domain::models::{message_ts_at, Config, JudgmentCache, JudgmentSkipConfig, Message, Scope};
use crate::domain::ports::{LlmClient, MessagingClient, Repositories};
use crate::services::periodic_loop::PeriodicTask;
use crate::services::prompts;

/// Scopes inspected per channel in one pass.
const MAX_SCOPES_PER_CHANNEL: u32 = 20;

/// Tuning for [`AutonomousResponseService`].
#[derive(Debug, Clone)]
pub struct AutonomousResponseConfig {
    /// The agent's own user id; scopes whose newest message is ours are skipped.
    pub bot_user_id: String,
    /// Messages of history fetched as context.
    pub history_limit: u32,
    /// Only scopes with a message inside this window are checked.
    pub lookback: Duration,
    /// Persona text prepended to every prompt.
    pub persona: String,
    /// Confidence to skip window mapping.
    pub skip: JudgmentSkipConfig,
}

impl AutonomousResponseConfig {
    /// Derive from the `agent` and `judgment` config sections.
    pub fn from_config(config: &Config) -> Self {
        let lookback_secs = i64::try_from(config.agent.lookback_secs).unwrap_or(i64::MAX);
        Self {
            bot_user_id: config.agent.bot_user_id.clone(),
            history_limit: config.agent.history_limit,
            lookback: Duration::try_seconds(lookback_secs).unwrap_or(Duration::MAX),
            persona: config.agent.persona.clone(),
            skip: config.judgment.clone(),
        }
    }
}

/// What happened when one scope was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOutcome {
    /// Nothing stored for the scope.
    NoMessages,
    /// The newest message is the agent's own.
    OwnMessage,
    /// A still-valid cached judgment was reused.
    CacheHit,
    /// A fresh decision was made.
    Judged { should_respond: bool, responded: bool },
}

/// Summary of one `run_once` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Expired cache rows deleted before the pass.
    pub expired_swept: u64,
    /// Scopes inspected, whatever the outcome.
    pub scopes_checked: usize,
    /// Scopes answered from a valid cached judgment.
    pub cache_hits: usize,
    /// Fresh decision calls made.
    pub judgments: usize,
    /// Replies actually sent.
    pub responses: usize,
    /// Scopes whose check failed.
    pub failures: usize,
}

impl CheckReport {
    fn record(&mut self, outcome: ScopeOutcome) {
        self.scopes_checked += 1;
        match outcome {
            ScopeOutcome::CacheHit => self.cache_hits += 1,
            ScopeOutcome::Judged { responded, .. } => {
                self.judgments += 1;
                if responded {
                    self.responses += 1;
                }
            }
            ScopeOutcome::NoMessages | ScopeOutcome::OwnMessage => {}
        }
    }
}

/// Decides, per conversation scope, whether the agent should reply.
///
/// Checks of the same scope are serialized: the timer pass, the periodic
/// checker and inbound messages all share one instance, and a second check
/// of a scope waits for the first and then sees its cached judgment.
pub struct AutonomousResponseService {
    repos: Repositories,
    messaging: Arc<dyn MessagingClient>,
    llm: Arc<dyn LlmClient>,
    config: AutonomousResponseConfig,
    scope_locks: Mutex<HashMap<Scope, Arc<Mutex<()>>>>,
}

impl AutonomousResponseService {
    /// Service deciding through `llm` and replying through `messaging`.
    pub fn new(
        repos: Repositories,
        messaging: Arc<dyn MessagingClient>,
        llm: Arc<dyn LlmClient>,
        config: AutonomousResponseConfig,
    ) -> Self {
        Self {
            repos,
            messaging,
            llm,
            config,
            scope_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock for one scope. Entries nobody holds are pruned on each call.
    async fn scope_lock(&self, scope: &Scope) -> Arc<Mutex<()>> {
        let mut locks = self.scope_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(scope.clone()).or_default())
    }

    /// Sweep expired judgments, then check every recently active scope of
    /// every active channel. A failing scope is logged and counted.
    pub async fn run_once(&self) -> DomainResult<CheckReport> {
        let now = Utc::now();
        let mut report = CheckReport::default();

        match self.repos.judgments.delete_expired(now).await {
            Ok(swept) => report.expired_swept = swept,
            Err(e) => tracing::warn!(error = %e, "judgment cache sweep failed"),
        }

        let cutoff = now
            .checked_sub_signed(self.config.lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let since_ts = message_ts_at(cutoff);

        for channel in self.repos.channels.list_active().await? {
            let scopes = self
                .repos
                .messages
                .active_scopes(&channel.id, &since_ts, MAX_SCOPES_PER_CHANNEL)
                .await?;
            for scope in scopes {
                match self.check_scope(&scope).await {
                    Ok(outcome) => report.record(outcome),
                    Err(e) => {
                        report.failures += 1;
                        tracing::error!(
                            channel_id = %scope.channel_id,
                            thread_ts = scope.key(),
                            error = %e,
                            "scope check failed"
                        );
                    }
                }
            }
        }

        tracing::info!(
            scopes_checked = report.scopes_checked,
            cache_hits = report.cache_hits,
            judgments = report.judgments,
            responses = report.responses,
            failures = report.failures,
            expired_swept = report.expired_swept,
            "autonomous check finished"
        );
        Ok(report)
    }

    /// Decide, and possibly reply, for one conversation scope.
    pub async fn check_scope(&self, scope: &Scope) -> DomainResult<ScopeOutcome> {
        let lock = self.scope_lock(scope).await;
        let _held = lock.lock().await;
        self.check_scope_locked(scope).await
    }

    async fn check_scope_locked(&self, scope: &Scope) -> DomainResult<ScopeOutcome> {
        let Some(latest) = self.repos.messages.latest_in_scope(scope).await? else {
            return Ok(ScopeOutcome::NoMessages);
        };
        if latest.user_id == self.config.bot_user_id {
            return Ok(ScopeOutcome::OwnMessage);
        }

        let now = Utc::now();
        if let Some(cached) = self.repos.judgments.find(scope).await? {
            if cached.is_valid(now, &latest.ts) {
                tracing::debug!(
                    channel_id = %scope.channel_id,
                    thread_ts = scope.key(),
                    next_check_at = %cached.next_check_at,
                    "judgment cache hit"
                );
                return Ok(ScopeOutcome::CacheHit);
            }
        }

        let context = self.build_context(scope).await?;
        let judgment = self.llm.judge(&context, &latest).await?;
        let next_check_at = self.config.skip.next_check_at(now, judgment.confidence);
        self.repos
            .judgments
            .upsert(&JudgmentCache::record(scope, &judgment, latest.ts.clone(), next_check_at, now))
            .await?;

        tracing::info!(
            channel_id = %scope.channel_id,
            thread_ts = scope.key(),
            should_respond = judgment.should_respond,
            confidence = judgment.confidence,
            next_check_at = %next_check_at,
            reason = %judgment.reason,
            "judgment recorded"
        );

        if !judgment.should_respond {
            return Ok(ScopeOutcome::Judged {
                should_respond: false,
                responded: false,
            });
        }

        let generation = self.llm.generate(&prompts::reply_prompt(&context, &judgment)).await?;
        let text = generation.text.trim();
        if text.is_empty() {
            tracing::warn!(channel_id = %scope.channel_id, thread_ts = scope.key(), "generated reply was empty");
            return Ok(ScopeOutcome::Judged {
                should_respond: true,
                responded: false,
            });
        }

        let reply_ts = self
            .messaging
            .send_message(&scope.channel_id, text, scope.thread_ts.as_deref())
            .await?;
        tracing::info!(
            channel_id = %scope.channel_id,
            thread_ts = scope.key(),
            reply_ts = %reply_ts,
            input_tokens = generation.usage.input_tokens,
            output_tokens = generation.usage.output_tokens,
            "reply sent"
        );

        let own = Message {
            channel_id: scope.channel_id.clone(),
            ts: reply_ts,
            thread_ts: scope.thread_ts.clone(),
            user_id: self.config.bot_user_id.clone(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.repos.messages.upsert(&own).await {
            tracing::warn!(channel_id = %scope.channel_id, error = %e, "failed to record own reply");
        }

        Ok(ScopeOutcome::Judged {
            should_respond: true,
            responded: true,
        })
    }

    async fn build_context(&self, scope: &Scope) -> DomainResult<String> {
        let history = match &scope.thread_ts {
            Some(thread_ts) => {
                self.messaging
                    .fetch_thread_history(&scope.channel_id, thread_ts, self.config.history_limit)
                    .await?
            }
            None => {
                self.messaging
                    .fetch_channel_history(&scope.channel_id, self.config.history_limit)
                    .await?
            }
        };
        let memory = self.repos.memories.find(&scope.channel_id).await?;
        let memos = self.repos.memos.list(Some(&scope.channel_id)).await?;

        Ok(prompts::conversation_context(
            &self.config.persona,
            scope,
            memory.as_ref(),
            &memos,
            &history,
        ))
    }
}

#[async_trait]
impl PeriodicTask for AutonomousResponseService {
    fn name(&self) -> &str {
        "autonomous-check"
    }

    async fn run_once(&self) -> DomainResult<()> {
        AutonomousResponseService::run_once(self).await.map(|_| ())
    }
}
