//! Event handlers binding queue events to use cases.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Event, IncomingMessage};
use crate::services::autonomous_response::AutonomousResponseService;
use crate::services::channel_sync::ChannelSyncService;
use crate::services::event_dispatcher::EventHandler;
use crate::services::memory_summary::MemorySummaryService;
use crate::services::message_intake::MessageIntakeService;

/// AUTONOMOUS_CHECK: one autonomous response pass.
pub struct AutonomousCheckHandler {
    service: Arc<AutonomousResponseService>,
}

impl AutonomousCheckHandler {
    /// Handler delegating to `service`.
    pub fn new(service: Arc<AutonomousResponseService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for AutonomousCheckHandler {
    fn name(&self) -> &str {
        "autonomous-check"
    }

    async fn handle(&self, _event: &Event) -> DomainResult<()> {
        self.service.run_once().await.map(|_| ())
    }
}

/// SUMMARY: refresh channel memories.
pub struct SummaryHandler {
    service: Arc<MemorySummaryService>,
}

impl SummaryHandler {
    /// Handler delegating to `service`.
    pub fn new(service: Arc<MemorySummaryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for SummaryHandler {
    fn name(&self) -> &str {
        "summary"
    }

    async fn handle(&self, _event: &Event) -> DomainResult<()> {
        self.service.run_once().await.map(|_| ())
    }
}

/// CHANNEL_SYNC: mirror the platform channel list.
pub struct ChannelSyncHandler {
    service: Arc<ChannelSyncService>,
}

impl ChannelSyncHandler {
    /// Handler delegating to `service`.
    pub fn new(service: Arc<ChannelSyncService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for ChannelSyncHandler {
    fn name(&self) -> &str {
        "channel-sync"
    }

    async fn handle(&self, _event: &Event) -> DomainResult<()> {
        self.service.run_once().await.map(|_| ())
    }
}

/// MESSAGE: store an inbound message and check its scope.
pub struct MessageHandler {
    service: Arc<MessageIntakeService>,
}

impl MessageHandler {
    /// Handler delegating to `service`.
    pub fn new(service: Arc<MessageIntakeService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn name(&self) -> &str {
        "message"
    }

    async fn handle(&self, event: &Event) -> DomainResult<()> {
        let incoming: IncomingMessage = event.parse_payload()?;
        let outcome = self.service.ingest(&incoming).await?;
        tracing::debug!(channel_id = %incoming.channel_id, ?outcome, "message handled");
        Ok(())
    }
}
