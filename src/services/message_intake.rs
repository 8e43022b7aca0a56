//! Inbound message intake use case.

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{IncomingMessage, Message, User};
use crate::domain::ports::Repositories;
use crate::services::autonomous_response::{AutonomousResponseService, ScopeOutcome};

/// Stores inbound messages and triggers a check of their scope.
pub struct MessageIntakeService {
    repos: Repositories,
    responder: Arc<AutonomousResponseService>,
    bot_user_id: String,
}

impl MessageIntakeService {
    /// `bot_user_id` marks the agent's own account when users are recorded.
    pub fn new(repos: Repositories, responder: Arc<AutonomousResponseService>, bot_user_id: impl Into<String>) -> Self {
        Self {
            repos,
            responder,
            bot_user_id: bot_user_id.into(),
        }
    }

    /// Store the author and the message, then check its scope.
    pub async fn ingest(&self, incoming: &IncomingMessage) -> DomainResult<ScopeOutcome> {
        self.record(incoming).await?;
        self.responder.check_scope(&incoming.scope()).await
    }

    /// Store the author and the message without checking the scope.
    ///
    /// MESSAGE events coalesce per scope, so inbound adapters record every
    /// message before enqueueing; the later check sees all of them.
    pub async fn record(&self, incoming: &IncomingMessage) -> DomainResult<()> {
        self.record_author(incoming).await?;
        self.repos.messages.upsert(&Message::from(incoming)).await?;
        tracing::debug!(
            channel_id = %incoming.channel_id,
            ts = %incoming.ts,
            thread_ts = incoming.thread_ts.as_deref().unwrap_or_default(),
            "message stored"
        );
        Ok(())
    }

    async fn record_author(&self, incoming: &IncomingMessage) -> DomainResult<()> {
        let existing = self.repos.users.find(&incoming.user_id).await?;
        let name = match (&incoming.user_name, &existing) {
            (Some(name), _) => name.clone(),
            // Keep a known name rather than overwrite it with the bare id.
            (None, Some(_)) => return Ok(()),
            (None, None) => incoming.user_id.clone(),
        };
        let mut user = User::new(incoming.user_id.clone(), name, incoming.user_id == self.bot_user_id);
        if let Some(existing) = existing {
            user.created_at = existing.created_at;
        }
        self.repos.users.upsert(&user).await
    }
}
